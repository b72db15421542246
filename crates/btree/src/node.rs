use std::fmt;

use record::CitizenRecord;

/// Handle of a node inside a [`BTree`](crate::BTree)'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One B-tree node: its records and, if internal, its child handles.
///
/// A node is a leaf exactly when it has no children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    pub(crate) records: Vec<CitizenRecord>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// Builds a node from parts; shape is checked when the node joins a tree
    /// through [`BTree::from_raw_parts`](crate::BTree::from_raw_parts).
    pub fn new(records: Vec<CitizenRecord>, children: Vec<NodeId>) -> Self {
        Self { records, children }
    }

    pub(crate) fn leaf(record: CitizenRecord) -> Self {
        Self {
            records: vec![record],
            children: Vec::new(),
        }
    }

    pub fn records(&self) -> &[CitizenRecord] {
        &self.records
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.records.len()
    }
}
