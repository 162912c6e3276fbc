use super::{NodeId, Tree};

/// Bounded pre-order traversal of a subtree. Yields every visited node together with its level relative to
/// the start node (which has level zero). Siblings are visited in child order
#[derive(Debug)]
pub struct DepthFirst<'a, T> {
    pub(super) tree: &'a Tree<T>,
    pub(super) stack: Vec<(NodeId, usize)>,
    pub(super) depth: usize,
}

impl<'a, T> Iterator for DepthFirst<'a, T> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, level) = self.stack.pop()?;
        if self.depth == 0 || level + 1 < self.depth {
            self.stack.extend(
                self.tree
                    .children_unchecked(id)
                    .iter()
                    .rev()
                    .map(|child| (*child, level + 1)),
            );
        }
        Some((id, level))
    }
}

/// Iterator over the ancestors of a node, starting with its parent and ending with the root
#[derive(Debug)]
pub struct Ancestors<'a, T> {
    pub(super) tree: &'a Tree<T>,
    pub(super) next: Option<NodeId>,
}

impl<'a, T> Iterator for Ancestors<'a, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.parent_unchecked(current);
        Some(current)
    }
}
