//! An n-ary ownership tree with change notification.
//!
//! Every node of a [`Tree`] is exclusively owned by its parent (the root is owned by the `Tree` itself) and
//! carries exactly one value. Nodes live in an arena and are addressed by generational [`NodeId`] handles,
//! which never take part in ownership: dropping a `Tree` drops all of its values, and a removed subtree is
//! handed out as a `Tree` of its own. A node therefore moves between parents only by being removed (which
//! yields an orphan `Tree`) and inserted again through [`Tree::insert_tree`].
//!
//! Structural edits are reported to the values of all ancestors of the edited node through the
//! [`TreeObserver`] trait.

use itertools::Itertools;

use crate::error::{Error, Result};

mod iter;
pub use self::iter::*;

mod types;
pub use self::types::*;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    value: T,
}

/// Arena-backed n-ary tree. See the [module documentation](self) for the ownership model
#[derive(Debug)]
pub struct Tree<T> {
    slots: Vec<Option<Slot<T>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
    len: usize,
}

impl<T> Tree<T> {
    fn empty() -> Self {
        Self {
            slots: vec![],
            generations: vec![],
            free_list: vec![],
            root: NodeId::new(0, 0),
            len: 0,
        }
    }

    fn alloc(&mut self, value: T, parent: Option<NodeId>) -> NodeId {
        let slot = |generation| Slot {
            generation,
            parent,
            children: vec![],
            value,
        };
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(slot(generation));
            NodeId::new(idx as u32, generation)
        } else {
            let generation = 1;
            self.slots.push(Some(slot(generation)));
            self.generations.push(generation);
            NodeId::new((self.slots.len() - 1) as u32, generation)
        }
    }

    fn free(&mut self, id: NodeId) -> Slot<T> {
        let slot = self.slots[id.idx()].take().expect("dangling NodeId");
        self.free_list.push(id.idx());
        self.len -= 1;
        slot
    }

    fn node(&self, id: NodeId) -> Result<&Slot<T>> {
        self.slots
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .filter(|slot| slot.generation == id.generation())
            .ok_or_else(|| Error::Key(format!("Node {:?} is not part of this tree", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Slot<T>> {
        self.slots
            .get_mut(id.idx())
            .and_then(|slot| slot.as_mut())
            .filter(|slot| slot.generation == id.generation())
            .ok_or_else(|| Error::Key(format!("Node {:?} is not part of this tree", id)))
    }

    fn node_unchecked(&self, id: NodeId) -> &Slot<T> {
        self.slots[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_unchecked_mut(&mut self, id: NodeId) -> &mut Slot<T> {
        self.slots[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn children_unchecked(&self, id: NodeId) -> &[NodeId] {
        &self.node_unchecked(id).children
    }

    pub(crate) fn parent_unchecked(&self, id: NodeId) -> Option<NodeId> {
        self.node_unchecked(id).parent
    }

    /// Handle of the root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in this tree, including the root
    pub fn node_count(&self) -> usize {
        self.len
    }

    /// Does `id` refer to a node of this tree?
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Returns the value of node `id`
    ///
    /// # Errors
    ///
    /// Returns an `Error::Key` if `id` is not a node of this tree. This holds for all accessors that take a
    /// `NodeId`
    pub fn value(&self, id: NodeId) -> Result<&T> {
        self.node(id).map(|slot| &slot.value)
    }

    /// Returns the value of node `id` mutably. Editing a value in place is not a structural edit and triggers no
    /// notification
    pub fn value_mut(&mut self, id: NodeId) -> Result<&mut T> {
        self.node_mut(id).map(|slot| &mut slot.value)
    }

    /// Returns the parent of node `id`, which is `None` for the root
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        self.node(id).map(|slot| slot.parent)
    }

    /// Returns the children of node `id`, in order
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        self.node(id).map(|slot| slot.children.as_slice())
    }

    /// Returns an iterator over the values of the children of node `id`, in child order
    pub fn child_values(&self, id: NodeId) -> Result<impl Iterator<Item = &T> + '_> {
        let children = self.children(id)?;
        Ok(children
            .iter()
            .map(move |child| &self.node_unchecked(*child).value))
    }

    /// Lets `reorder` permute the children of node `id`. Reordering is not a structural edit, so no observer
    /// is notified.
    /// ```
    /// # use canopy_core::tree::*;
    /// # struct Label(&'static str);
    /// # impl TreeObserver for Label {}
    /// let mut tree = Tree::new(Label("root"));
    /// let root = tree.root();
    /// tree.insert(root, Label("a")).unwrap();
    /// tree.insert(root, Label("b")).unwrap();
    /// tree.reorder_children(root, |children| children.reverse()).unwrap();
    /// let labels = tree.child_values(root).unwrap().map(|l| l.0).collect::<Vec<_>>();
    /// assert_eq!(vec!["b", "a"], labels);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an `Error::Invariant` if the children after `reorder` are not a permutation of the children
    /// before it. In that case, the original order is restored
    pub fn reorder_children<F: FnOnce(&mut [NodeId])>(
        &mut self,
        id: NodeId,
        reorder: F,
    ) -> Result<()> {
        let slot = self.node_mut(id)?;
        let original = slot.children.clone();
        reorder(slot.children.as_mut_slice());
        if !original.iter().sorted().eq(slot.children.iter().sorted()) {
            slot.children = original;
            return Err(Error::Invariant(format!(
                "Reordering the children of {:?} must not add or drop nodes",
                id
            )));
        }
        Ok(())
    }

    /// Returns an iterator over the ancestors of node `id`, from its parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Result<Ancestors<'_, T>> {
        let parent = self.parent(id)?;
        Ok(Ancestors {
            tree: self,
            next: parent,
        })
    }

    /// Pre-order traversal of the subtree at `id` that visits at most `depth` levels, where `depth == 0` means
    /// no limit and `depth == 1` visits only `id` itself. Yields each node with its level relative to `id`
    pub fn depth_first(&self, id: NodeId, depth: usize) -> Result<DepthFirst<'_, T>> {
        self.node(id)?;
        Ok(DepthFirst {
            tree: self,
            stack: vec![(id, 0)],
            depth,
        })
    }

    /// Number of edges between `ancestor` and `node`, or `None` if `node` is not in the subtree of `ancestor`.
    /// The distance of a node to itself is zero
    pub fn distance(&self, ancestor: NodeId, node: NodeId) -> Option<usize> {
        self.node(node).ok()?;
        let mut current = node;
        let mut distance = 0;
        while current != ancestor {
            current = self.parent_unchecked(current)?;
            distance += 1;
        }
        Some(distance)
    }

    /// Is `node` part of the subtree at `ancestor`?
    pub fn is_descendant_or_self(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.distance(ancestor, node).is_some()
    }

    /// Moves the subtree at `id` from `from` into `to`, below `parent`. The root of the subtree is not linked
    /// into the children of `parent`, this is up to the caller
    fn transplant(from: &mut Self, to: &mut Self, id: NodeId, parent: Option<NodeId>) -> NodeId
    where
        T: TreeObserver,
    {
        let Slot {
            children, value, ..
        } = from.free(id);
        let new_id = to.alloc(value, parent);
        for child in children {
            let new_child = Self::transplant(from, to, child, Some(new_id));
            to.node_unchecked_mut(new_id).children.push(new_child);
        }
        to.node_unchecked_mut(new_id).value.attached(new_id);
        new_id
    }
}

impl<T: TreeObserver> Tree<T> {
    /// Creates a new tree consisting of a single root node holding `value`
    pub fn new(value: T) -> Self {
        let mut tree = Self::empty();
        tree.root = tree.alloc(value, None);
        let root = tree.root;
        tree.node_unchecked_mut(root).value.attached(root);
        tree
    }

    /// Creates a new child of `parent` holding `value` and appends it to the end of the children of `parent`.
    /// Returns the handle of the new node
    pub fn insert(&mut self, parent: NodeId, value: T) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.alloc(value, Some(parent));
        self.node_unchecked_mut(parent).children.push(id);
        self.node_unchecked_mut(id).value.attached(id);
        self.notify(Change {
            kind: ChangeKind::Inserted,
            node: id,
            parent,
        });
        Ok(id)
    }

    /// Takes ownership of the tree `orphan` and appends its root to the end of the children of `parent`. All
    /// nodes of `orphan` receive new handles, the handle of its root is returned
    pub fn insert_tree(&mut self, parent: NodeId, mut orphan: Tree<T>) -> Result<NodeId> {
        self.node(parent)?;
        let orphan_root = orphan.root;
        let id = Self::transplant(&mut orphan, self, orphan_root, Some(parent));
        self.node_unchecked_mut(parent).children.push(id);
        self.notify(Change {
            kind: ChangeKind::Inserted,
            node: id,
            parent,
        });
        Ok(id)
    }

    /// Detaches the child at `position` of `parent` and returns its whole subtree as a new `Tree`. Dropping the
    /// returned tree destroys the subtree, inserting it through [`Tree::insert_tree`] appends it to the end of
    /// the children of the new parent.
    ///
    /// # Errors
    ///
    /// Returns an `Error::Index` if `parent` has no child at `position`
    pub fn remove(&mut self, parent: NodeId, position: usize) -> Result<Tree<T>> {
        let slot = self.node(parent)?;
        let child = *slot.children.get(position).ok_or_else(|| {
            Error::Index(format!(
                "Node {:?} has {} children, there is no child at position {}",
                parent,
                slot.children.len(),
                position
            ))
        })?;
        self.notify(Change {
            kind: ChangeKind::Removed,
            node: child,
            parent,
        });
        self.node_unchecked_mut(parent)
            .children
            .retain(|existing| *existing != child);

        let mut orphan = Self::empty();
        orphan.root = Self::transplant(self, &mut orphan, child, None);
        Ok(orphan)
    }

    /// Calls the observer of `change.parent` and of all of its ancestors, in that order
    fn notify(&mut self, change: Change) {
        let path = std::iter::once(change.parent)
            .chain(Ancestors {
                tree: self,
                next: self.parent_unchecked(change.parent),
            })
            .collect::<Vec<_>>();
        for observer in path {
            if self.contains(observer) {
                T::changed(self, observer, &change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    /// Records its own drop and every change it observes
    #[derive(Debug)]
    struct Probe {
        name: &'static str,
        node: Option<NodeId>,
        observed: Vec<Change>,
        dropped: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Probe {
        fn new(name: &'static str, dropped: &Rc<RefCell<Vec<&'static str>>>) -> Self {
            Self {
                name,
                node: None,
                observed: vec![],
                dropped: dropped.clone(),
            }
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.dropped.borrow_mut().push(self.name);
        }
    }

    impl TreeObserver for Probe {
        fn attached(&mut self, node: NodeId) {
            self.node = Some(node);
        }

        fn changed(tree: &mut Tree<Self>, observer: NodeId, change: &Change) {
            tree.value_mut(observer).unwrap().observed.push(*change);
        }
    }

    fn names(tree: &Tree<Probe>, id: NodeId) -> Vec<&'static str> {
        tree.child_values(id).unwrap().map(|p| p.name).collect()
    }

    /// root -> (a -> (a1, a2), b)
    fn sample_tree(dropped: &Rc<RefCell<Vec<&'static str>>>) -> (Tree<Probe>, [NodeId; 4]) {
        let mut tree = Tree::new(Probe::new("root", dropped));
        let root = tree.root();
        let a = tree.insert(root, Probe::new("a", dropped)).unwrap();
        let b = tree.insert(root, Probe::new("b", dropped)).unwrap();
        let a1 = tree.insert(a, Probe::new("a1", dropped)).unwrap();
        let a2 = tree.insert(a, Probe::new("a2", dropped)).unwrap();
        (tree, [a, b, a1, a2])
    }

    #[test]
    fn test_insert_appends_children() {
        let dropped = Rc::default();
        let (tree, [a, b, a1, a2]) = sample_tree(&dropped);
        let root = tree.root();
        assert_eq!(5, tree.node_count());
        assert_eq!(&[a, b], tree.children(root).unwrap());
        assert_eq!(&[a1, a2], tree.children(a).unwrap());
        assert_eq!(vec!["a", "b"], names(&tree, root));
        assert_eq!(Some(a), tree.parent(a1).unwrap());
        assert_eq!(None, tree.parent(root).unwrap());
        assert_eq!(Some(a2), tree.value(a2).unwrap().node);
    }

    #[test]
    fn test_every_ancestor_is_notified_once() {
        let dropped = Rc::default();
        let (tree, [a, b, a1, a2]) = sample_tree(&dropped);
        let root = tree.root();

        // The root saw all four insertions, `a` only the two below it, leaves saw nothing
        assert_eq!(4, tree.value(root).unwrap().observed.len());
        let observed_by_a = &tree.value(a).unwrap().observed;
        assert_eq!(
            vec![
                Change {
                    kind: ChangeKind::Inserted,
                    node: a1,
                    parent: a
                },
                Change {
                    kind: ChangeKind::Inserted,
                    node: a2,
                    parent: a
                }
            ],
            *observed_by_a
        );
        assert!(tree.value(b).unwrap().observed.is_empty());
        assert!(tree.value(a1).unwrap().observed.is_empty());
    }

    #[test]
    fn test_remove_notifies_and_detaches() {
        let dropped = Rc::default();
        let (mut tree, [a, _b, a1, _a2]) = sample_tree(&dropped);
        let root = tree.root();

        let orphan = tree.remove(a, 0).unwrap();
        assert_eq!(1, orphan.node_count());
        assert_eq!("a1", orphan.value(orphan.root()).unwrap().name);
        assert!(!tree.contains(a1));
        assert_eq!(4, tree.node_count());

        let last_seen_by_root = *tree.value(root).unwrap().observed.last().unwrap();
        assert_eq!(ChangeKind::Removed, last_seen_by_root.kind);
        assert_eq!(a1, last_seen_by_root.node);
        assert_eq!(ChangeKind::Removed, tree.value(a).unwrap().observed[2].kind);
    }

    #[test]
    fn test_dropping_removed_subtree_destroys_it() {
        let dropped = Rc::default();
        let (mut tree, [a, ..]) = sample_tree(&dropped);
        let root = tree.root();
        let position = tree.children(root).unwrap().iter().position(|c| *c == a).unwrap();

        let orphan = tree.remove(root, position).unwrap();
        assert!(dropped.borrow().is_empty());
        assert_eq!(3, orphan.node_count());
        drop(orphan);

        let mut destroyed = dropped.borrow().clone();
        destroyed.sort_unstable();
        assert_eq!(vec!["a", "a1", "a2"], destroyed);
        assert_eq!(2, tree.node_count());
        assert!(!tree.contains(a));
    }

    #[test]
    fn test_reinsert_appends_at_end() {
        let dropped = Rc::default();
        let (mut tree, [_a, b, ..]) = sample_tree(&dropped);
        let root = tree.root();

        let orphan = tree.remove(root, 0).unwrap();
        assert_eq!(1, tree.children(root).unwrap().len());
        let a = tree.insert_tree(root, orphan).unwrap();

        assert_eq!(2, tree.children(root).unwrap().len());
        assert_eq!(&[b, a], tree.children(root).unwrap());
        assert_eq!(vec!["a1", "a2"], names(&tree, a));
        assert_eq!(Some(a), tree.value(a).unwrap().node);
        for child in tree.children(a).unwrap() {
            assert_eq!(Some(*child), tree.value(*child).unwrap().node);
            assert_eq!(Some(a), tree.parent(*child).unwrap());
        }
        assert!(dropped.borrow().is_empty());
    }

    #[test]
    fn test_remove_invalid_position() {
        let dropped = Rc::default();
        let (mut tree, [_, b, ..]) = sample_tree(&dropped);
        assert!(matches!(tree.remove(b, 0), Err(Error::Index(_))));
        assert!(matches!(tree.remove(tree.root(), 2), Err(Error::Index(_))));
    }

    #[test]
    fn test_stale_handles_are_rejected() {
        let dropped = Rc::default();
        let (mut tree, [a, ..]) = sample_tree(&dropped);
        let root = tree.root();
        drop(tree.remove(root, 0).unwrap());

        // The freed slot is reused with a new generation
        let c = tree.insert(root, Probe::new("c", &dropped)).unwrap();
        assert_ne!(a, c);
        assert!(matches!(tree.value(a), Err(Error::Key(_))));
        assert!(matches!(
            tree.insert(a, Probe::new("d", &dropped)),
            Err(Error::Key(_))
        ));
    }

    #[test]
    fn test_reorder_children() {
        let dropped = Rc::default();
        let (mut tree, [a, b, ..]) = sample_tree(&dropped);
        let root = tree.root();
        let observed_before = tree.value(root).unwrap().observed.len();

        tree.reorder_children(root, |children| children.swap(0, 1))
            .unwrap();
        assert_eq!(&[b, a], tree.children(root).unwrap());
        assert_eq!(observed_before, tree.value(root).unwrap().observed.len());

        let result = tree.reorder_children(root, |children| children[0] = children[1]);
        assert!(matches!(result, Err(Error::Invariant(_))));
        assert_eq!(&[b, a], tree.children(root).unwrap());
    }

    #[test]
    fn test_depth_first_levels() {
        let dropped = Rc::default();
        let (tree, [a, b, a1, a2]) = sample_tree(&dropped);
        let root = tree.root();

        let unlimited = tree.depth_first(root, 0).unwrap().collect::<Vec<_>>();
        assert_eq!(
            vec![(root, 0), (a, 1), (a1, 2), (a2, 2), (b, 1)],
            unlimited
        );

        let only_root = tree.depth_first(root, 1).unwrap().collect::<Vec<_>>();
        assert_eq!(vec![(root, 0)], only_root);

        let two_levels = tree
            .depth_first(root, 2)
            .unwrap()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        assert_eq!(vec![root, a, b], two_levels);

        let below_a = tree
            .depth_first(a, 0)
            .unwrap()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        assert_eq!(vec![a, a1, a2], below_a);
    }

    #[test]
    fn test_ancestors_and_distance() {
        let dropped = Rc::default();
        let (tree, [a, b, a1, _]) = sample_tree(&dropped);
        let root = tree.root();

        assert_eq!(vec![a, root], tree.ancestors(a1).unwrap().collect::<Vec<_>>());
        assert_eq!(0, tree.ancestors(root).unwrap().count());
        assert_eq!(Some(2), tree.distance(root, a1));
        assert_eq!(Some(0), tree.distance(a, a));
        assert_eq!(None, tree.distance(b, a1));
        assert!(tree.is_descendant_or_self(a1, a));
        assert!(!tree.is_descendant_or_self(a, a1));
    }

    #[test]
    fn test_dropping_tree_drops_all_values() {
        let dropped = Rc::default();
        let (tree, _) = sample_tree(&dropped);
        drop(tree);
        assert_eq!(5, dropped.borrow().len());
    }
}
