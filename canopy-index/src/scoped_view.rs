use canopy_core::{
    containers::{CoordinateRange, Cursor, Dataset, Selection},
    tree::{NodeId, Tree},
    Error, Result,
};
use log::trace;

use crate::{KdTreeParams, Points, Scope, ScopedKdTree};

/// A point cloud of a single node that takes part in a [`ScopedView`]
#[derive(Debug, Clone)]
pub(crate) struct ViewEntry {
    pub(crate) node: NodeId,
    pub(crate) pc: Dataset,
    pub(crate) selection: Selection,
}

/// Collects the view entries for `scope` from the subtree at `start`, visiting at most `depth` levels (zero
/// meaning all levels) in pre-order. Nodes that lack the point cloud or one of the coordinate arrays are
/// skipped
pub(crate) fn collect_entries(
    tree: &Tree<Points>,
    start: NodeId,
    depth: usize,
    scope: &Scope,
) -> Result<Vec<ViewEntry>> {
    let mut entries = vec![];
    for (node, level) in tree.depth_first(start, depth)? {
        let pc = match tree.value(node)?.local_pcs().get(&scope.pcname) {
            Some(pc) => pc,
            None => {
                trace!("{:?} (level {}) has no point cloud {:?}", node, level, scope.pcname);
                continue;
            }
        };
        if !pc.contains_all(&scope.coords) {
            trace!("{:?} (level {}) lacks coordinates of {}", node, level, scope);
            continue;
        }
        entries.push(ViewEntry {
            node,
            pc: pc.clone(),
            selection: pc.selection(&scope.coords)?,
        });
    }
    Ok(entries)
}

/// Aggregation of the point clouds of a subtree for one [`Scope`].
///
/// The participating nodes, their point clouds and the selected coordinate arrays are stored index-aligned,
/// i.e. `nodes()[i]`, `pcs()[i]` and `selections()[i]` belong together, and `i` is also the major index that
/// the [`ScopedKdTree`] reports for points of that node. Point clouds are shallow copies which share their
/// arrays with the nodes.
#[derive(Debug, Clone)]
pub struct ScopedView {
    nodes: Vec<NodeId>,
    pcs: Vec<Dataset>,
    selections: Vec<Selection>,
    kd: ScopedKdTree<f64>,
}

impl ScopedView {
    pub(crate) fn build(
        tree: &Tree<Points>,
        start: NodeId,
        scope: &Scope,
        params: KdTreeParams,
    ) -> Result<Self> {
        let entries = collect_entries(tree, start, scope.depth, scope)?;
        let kd = ScopedKdTree::build(
            scope.dimensions(),
            entries
                .iter()
                .map(|entry| CoordinateRange::new(entry.selection.clone())),
            params,
        )?;
        let mut view = Self {
            nodes: Vec::with_capacity(entries.len()),
            pcs: Vec::with_capacity(entries.len()),
            selections: Vec::with_capacity(entries.len()),
            kd,
        };
        for entry in entries {
            view.push_entry(entry);
        }
        Ok(view)
    }

    /// Appends `entries` in order. Entries before a failing one stay in the view, and the view stays aligned
    pub(crate) fn extend(&mut self, entries: Vec<ViewEntry>) -> Result<()> {
        for entry in entries {
            self.kd
                .append(CoordinateRange::new(entry.selection.clone()))?;
            self.push_entry(entry);
        }
        Ok(())
    }

    fn push_entry(&mut self, entry: ViewEntry) {
        self.nodes.push(entry.node);
        self.pcs.push(entry.pc);
        self.selections.push(entry.selection);
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn pcs(&self) -> &[Dataset] {
        &self.pcs
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// The spatial index over all points of this view
    pub fn kd(&self) -> &ScopedKdTree<f64> {
        &self.kd
    }

    /// Number of participating point clouds
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total number of points over all participating point clouds
    pub fn num_points(&self) -> usize {
        self.kd.len()
    }

    /// Returns the node and point cloud that `cursor` points into, together with the index of the point within
    /// that point cloud.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Index` if `cursor` is out of range for this view
    pub fn resolve(&self, cursor: &Cursor) -> Result<(NodeId, &Dataset, usize)> {
        let (major, minor) = self.kd.range().locate(cursor.index()).ok_or_else(|| {
            Error::Index(format!(
                "Cursor {} is out of range for a view of {} points",
                cursor.index(),
                self.num_points()
            ))
        })?;
        Ok((self.nodes[major], &self.pcs[major], minor))
    }
}
