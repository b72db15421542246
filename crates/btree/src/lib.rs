//! # BTree
//!
//! An order-`t` B-tree of [`CitizenRecord`]s keyed by their 8-byte
//! [`Identifier`], built for tens of millions of in-memory entries.
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to their children by
//! [`NodeId`] handles. Every handle is held by exactly one parent, so the
//! structure is still a strict tree. Dropping the tree frees one vector instead
//! of recursing through owned boxes, and every walk (search, in-order iteration,
//! invariant checks, snapshot encoding) runs with an explicit stack.
//!
//! ## Shape
//! - Every node holds at most `2t - 1` records in ascending identifier order.
//! - Every non-root node holds at least `t - 1` records.
//! - Internal nodes have exactly one more child than records; leaves have none.
//! - All leaves sit at the same depth.
//!
//! Insertion splits full nodes on the way down, so it never has to walk back
//! up the tree.
//!
//! ## Example
//! ```rust
//! use btree::BTree;
//! use record::CitizenRecord;
//!
//! let mut tree = BTree::new(3).unwrap();
//! let id = "30000000".parse().unwrap();
//! tree.insert(CitizenRecord::with_id(id));
//! assert_eq!(tree.search(&id).map(|r| r.id), Some(id));
//! ```

mod check;
mod iter;
mod node;
mod tree;

pub use iter::Iter;
pub use node::{Node, NodeId};
pub use tree::{BTree, MIN_ORDER};

use record::Identifier;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BTreeError {
    #[error("order {0} is below the minimum of 2")]
    InvalidOrder(usize),
    #[error("node {node} holds {keys} keys, allowed {min}..={max}")]
    KeyCount {
        node: NodeId,
        keys: usize,
        min: usize,
        max: usize,
    },
    #[error("internal node {node} has {children} children for {keys} keys")]
    ChildCount {
        node: NodeId,
        keys: usize,
        children: usize,
    },
    #[error("node {node} keys out of order at position {position}")]
    Unsorted { node: NodeId, position: usize },
    #[error("node {node} key {key} lies outside its parent's separators")]
    Separator { node: NodeId, key: Identifier },
    #[error("leaf {node} at depth {depth}, expected {expected}")]
    LeafDepth {
        node: NodeId,
        depth: usize,
        expected: usize,
    },
    #[error("node {0} does not exist")]
    DanglingChild(NodeId),
    #[error("node {0} is referenced more than once")]
    SharedNode(NodeId),
    #[error("{unreachable} arena nodes are unreachable from the root")]
    Unreachable { unreachable: usize },
    #[error("empty root node {0}")]
    EmptyRoot(NodeId),
}
