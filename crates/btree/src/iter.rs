use record::CitizenRecord;

use crate::node::NodeId;
use crate::BTree;

/// In-order iterator over a [`BTree`], driven by an explicit stack of
/// `(node, next record position)` frames.
pub struct Iter<'a> {
    tree: &'a BTree,
    stack: Vec<(NodeId, usize)>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(tree: &'a BTree) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::with_capacity(tree.height()),
            remaining: tree.len(),
        };
        if let Some(root) = tree.root() {
            iter.descend_leftmost(root);
        }
        iter
    }

    fn descend_leftmost(&mut self, from: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            self.stack.push((id, 0));
            current = self.tree.node(id).children().first().copied();
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a CitizenRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let frame = self.stack.last_mut()?;
            let node = tree.node(frame.0);
            if frame.1 < node.key_count() {
                let record = &node.records()[frame.1];
                frame.1 += 1;
                if let Some(&child) = node.children().get(frame.1) {
                    self.descend_leftmost(child);
                }
                self.remaining = self.remaining.saturating_sub(1);
                return Some(record);
            }
            self.stack.pop();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
