use static_assertions::const_assert_eq;

use super::Tree;

/// Handle of a node in a [`Tree`].
///
/// This is a small, copyable handle consisting of a slot index and a generation counter. It does not own the
/// node. When a node is removed from its tree, its handle becomes stale and never aliases a different node,
/// since reused slots get a new generation. Nodes that move between trees (by [`Tree::remove`] and
/// [`Tree::insert_tree`]) receive new handles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(u32, u32);

const_assert_eq!(std::mem::size_of::<NodeId>(), 8);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// The kind of a structural edit
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Inserted,
    Removed,
}

/// Notification payload for a structural edit of a [`Tree`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Change {
    pub kind: ChangeKind,
    /// The inserted node (already attached), or the node that is about to be removed (still attached)
    pub node: NodeId,
    /// The node whose children were edited
    pub parent: NodeId,
}

/// Capability of a node value to observe the tree it lives in.
///
/// On every [`Tree::insert`], [`Tree::insert_tree`] and [`Tree::remove`], the tree walks from the edited
/// parent up to the root and calls [`TreeObserver::changed`] exactly once for every node on that path. This
/// is the only way that node values learn about structural edits below them. Implementations receive the
/// whole tree so that they can inspect the edited subtree, but they must only mutate their own value and must
/// not perform structural edits.
pub trait TreeObserver: Sized {
    /// Called whenever this value receives a new handle: when its tree is created, when it is inserted into a
    /// tree and when it is moved out of a tree through [`Tree::remove`]
    fn attached(&mut self, _node: NodeId) {}

    /// Called for the node `observer` when a structural edit happened at or below it
    fn changed(_tree: &mut Tree<Self>, _observer: NodeId, _change: &Change) {}
}
