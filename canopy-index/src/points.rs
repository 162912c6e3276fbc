use std::collections::{BTreeMap, HashMap};

use canopy_core::{
    containers::Dataset,
    tree::{Change, ChangeKind, NodeId, Tree, TreeObserver},
    Error, Result,
};
use log::{debug, warn};

use crate::{
    scoped_view::{collect_entries, ScopedView},
    KdTreeParams, Scope,
};

/// Value of a node in a point-cloud tree: a set of named point clouds, plus a cache of the [`ScopedView`]s
/// that were requested for this node.
///
/// Cached views are kept up to date with structural edits of the tree. When a subtree is inserted below this
/// node, the views grow by the matching point clouds of the new nodes. When a subtree that takes part in a
/// view is removed, the view is discarded and rebuilt on the next request. Edits of point clouds of nodes that
/// are already in a tree are not tracked, use [`PointsTreeExt::invalidate_scoped_views`] after such edits.
#[derive(Debug, Default)]
pub struct Points {
    local_pcs: BTreeMap<String, Dataset>,
    node: Option<NodeId>,
    kd_params: KdTreeParams,
    cache: HashMap<Scope, ScopedView>,
}

impl Points {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the parameters for the kd trees of views built for this node
    pub fn with_kd_params(mut self, params: KdTreeParams) -> Self {
        self.kd_params = params;
        self
    }

    /// Adds the point cloud `pc` under `name`, returning the point cloud previously stored under that name
    pub fn insert<S: Into<String>>(&mut self, name: S, pc: Dataset) -> Option<Dataset> {
        self.local_pcs.insert(name.into(), pc)
    }

    pub fn remove(&mut self, name: &str) -> Option<Dataset> {
        self.local_pcs.remove(name)
    }

    /// Returns the point cloud stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Key` if there is no such point cloud
    pub fn get(&self, name: &str) -> Result<&Dataset> {
        self.local_pcs
            .get(name)
            .ok_or_else(|| Error::Key(format!("No point cloud named {:?}", name)))
    }

    pub fn local_pcs(&self) -> &BTreeMap<String, Dataset> {
        &self.local_pcs
    }

    /// Handle of the node holding this value, or `None` if this value is not part of a tree
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn kd_params(&self) -> &KdTreeParams {
        &self.kd_params
    }

    /// The scopes for which a view is currently cached
    pub fn cached_scopes(&self) -> impl Iterator<Item = &Scope> + '_ {
        self.cache.keys()
    }

    pub fn cached_view(&self, scope: &Scope) -> Option<&ScopedView> {
        self.cache.get(scope)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn grow_views(tree: &mut Tree<Self>, observer: NodeId, inserted: NodeId) {
        let scopes = match tree.value(observer) {
            Ok(points) if !points.cache.is_empty() => {
                points.cache.keys().cloned().collect::<Vec<_>>()
            }
            _ => return,
        };
        let base = match tree.distance(observer, inserted) {
            Some(distance) => distance,
            None => return,
        };

        for scope in scopes {
            if !scope.includes_distance(base) {
                continue;
            }
            let remaining = if scope.depth == 0 {
                0
            } else {
                scope.depth - base
            };
            let grown = collect_entries(tree, inserted, remaining, &scope).and_then(|entries| {
                let count = entries.len();
                let points = tree.value_mut(observer)?;
                match points.cache.get_mut(&scope) {
                    Some(view) => view.extend(entries).map(|_| count),
                    None => Ok(0),
                }
            });
            match grown {
                Ok(0) => {}
                Ok(count) => debug!(
                    "Grew scoped view {} of {:?} by {} point clouds",
                    scope, observer, count
                ),
                Err(err) => {
                    warn!(
                        "Discarding scoped view {} of {:?}, it could not grow: {}",
                        scope, observer, err
                    );
                    if let Ok(points) = tree.value_mut(observer) {
                        points.cache.remove(&scope);
                    }
                }
            }
        }
    }

    fn invalidate_views(tree: &mut Tree<Self>, observer: NodeId, removed: NodeId) {
        let stale = match tree.value(observer) {
            Ok(points) => points
                .cache
                .iter()
                .filter(|(_, view)| {
                    view.nodes()
                        .iter()
                        .any(|node| tree.is_descendant_or_self(*node, removed))
                })
                .map(|(scope, _)| scope.clone())
                .collect::<Vec<_>>(),
            Err(_) => return,
        };
        if stale.is_empty() {
            return;
        }
        if let Ok(points) = tree.value_mut(observer) {
            for scope in stale {
                debug!("Discarding scoped view {} of {:?}", scope, observer);
                points.cache.remove(&scope);
            }
        }
    }
}

/// Copies the point clouds and kd parameters. The copy is not part of any tree and starts with an empty cache
impl Clone for Points {
    fn clone(&self) -> Self {
        Self {
            local_pcs: self.local_pcs.clone(),
            node: None,
            kd_params: self.kd_params,
            cache: HashMap::new(),
        }
    }
}

impl TreeObserver for Points {
    fn attached(&mut self, node: NodeId) {
        self.node = Some(node);
        self.cache.clear();
    }

    fn changed(tree: &mut Tree<Self>, observer: NodeId, change: &Change) {
        match change.kind {
            ChangeKind::Inserted => Self::grow_views(tree, observer, change.node),
            ChangeKind::Removed => Self::invalidate_views(tree, observer, change.node),
        }
    }
}

/// Scoped view queries on a tree of [`Points`]
pub trait PointsTreeExt {
    /// Returns the view of `scope` starting at `node`, building and caching it on first request.
    ///
    /// The view contains, in pre-order, every node within the depth window of `scope` that holds a point cloud
    /// named `scope.pcname` with all of the coordinate arrays `scope.coords`. Other nodes are skipped.
    ///
    /// ```
    /// # use canopy_core::{containers::{Array, Dataset}, tree::Tree};
    /// # use canopy_index::{Points, PointsTreeExt, Scope};
    /// let mut tree = Tree::new(Points::new());
    /// let mut points = Points::new();
    /// points.insert("3d", Dataset::from_arrays(vec![
    ///     ("x", Array::new(vec![1.0, 2.0])),
    ///     ("y", Array::new(vec![0.0, 0.0])),
    /// ]).unwrap());
    /// tree.insert(tree.root(), points).unwrap();
    ///
    /// let view = tree.scoped_view(tree.root(), &Scope::new("3d", ["x", "y"], 0)).unwrap();
    /// assert_eq!(1, view.len());
    /// assert_eq!(2, view.num_points());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an `Error::Key` if `node` is not part of this tree, an `Error::Type` if a selected coordinate
    /// array does not store `f64` values, and an `Error::Invariant` if a selected coordinate array is not
    /// one-dimensional
    fn scoped_view(&mut self, node: NodeId, scope: &Scope) -> Result<&ScopedView>;

    /// Discards the cached views of `node` and of all its ancestors. Call this after editing point clouds of
    /// `node` in place.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Key` if `node` is not part of this tree
    fn invalidate_scoped_views(&mut self, node: NodeId) -> Result<()>;
}

impl PointsTreeExt for Tree<Points> {
    fn scoped_view(&mut self, node: NodeId, scope: &Scope) -> Result<&ScopedView> {
        let points = self.value(node)?;
        if !points.cache.contains_key(scope) {
            let params = points.kd_params;
            let view = ScopedView::build(self, node, scope, params)?;
            debug!(
                "Built scoped view {} of {:?} over {} point clouds ({} points)",
                scope,
                node,
                view.len(),
                view.num_points()
            );
            self.value_mut(node)?.cache.insert(scope.clone(), view);
        }
        self.value(node)?
            .cache
            .get(scope)
            .ok_or_else(|| Error::Key(format!("No cached view for {}", scope)))
    }

    fn invalidate_scoped_views(&mut self, node: NodeId) -> Result<()> {
        let path = std::iter::once(node)
            .chain(self.ancestors(node)?)
            .collect::<Vec<_>>();
        for id in path {
            self.value_mut(id)?.clear_cache();
        }
        Ok(())
    }
}
