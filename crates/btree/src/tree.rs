use record::{CitizenRecord, Identifier};

use crate::iter::Iter;
use crate::node::{Node, NodeId};
use crate::BTreeError;

/// Smallest order (minimum degree) a tree can be built with.
pub const MIN_ORDER: usize = 2;

/// Order-`t` B-tree of citizen records.
///
/// The order is fixed at construction. Nodes are allocated in `nodes` and never
/// freed individually; there is no deletion, so the arena only grows.
///
/// # Duplicates
///
/// Identifiers are not deduplicated. A second record with an existing
/// identifier is stored next to the first one, and [`search`](Self::search)
/// returns whichever copy its descent reaches first (first-match semantics).
#[derive(Debug, Clone)]
pub struct BTree {
    order: usize,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    len: usize,
}

impl BTree {
    /// Creates an empty tree of minimum degree `order`.
    ///
    /// # Errors
    ///
    /// [`BTreeError::InvalidOrder`] if `order < 2`.
    pub fn new(order: usize) -> Result<Self, BTreeError> {
        if order < MIN_ORDER {
            return Err(BTreeError::InvalidOrder(order));
        }
        Ok(Self {
            order,
            nodes: Vec::new(),
            root: None,
            len: 0,
        })
    }

    /// Adopts an already-built arena, e.g. one decoded from a snapshot.
    ///
    /// `root == None` means an empty tree and requires `nodes` to be empty.
    /// The result must pass [`check_invariants`](Self::check_invariants), so a
    /// malformed arena is rejected rather than becoming a live tree.
    pub fn from_raw_parts(
        order: usize,
        nodes: Vec<Node>,
        root: Option<NodeId>,
    ) -> Result<Self, BTreeError> {
        let mut tree = Self::new(order)?;
        if root.is_none() && !nodes.is_empty() {
            return Err(BTreeError::Unreachable {
                unreachable: nodes.len(),
            });
        }
        tree.len = nodes.iter().map(Node::key_count).sum();
        tree.nodes = nodes;
        tree.root = root;
        tree.check_invariants()?;
        Ok(tree)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Maximum records per node, `2t - 1`.
    pub fn max_keys(&self) -> usize {
        2 * self.order - 1
    }

    /// Minimum records per non-root node, `t - 1`.
    pub fn min_keys(&self) -> usize {
        self.order - 1
    }

    /// Number of records stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of levels; 0 for an empty tree, 1 for a lone leaf root.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root;
        while let Some(id) = current {
            height += 1;
            current = self.node(id).children.first().copied();
        }
        height
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the node behind `id`.
    ///
    /// Panics if `id` was not produced by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Inserts `record`, growing the tree as needed. Never fails.
    ///
    /// A full root is split before descending, and every full child is split
    /// before it is entered, so the leaf that finally receives the record
    /// always has room.
    pub fn insert(&mut self, record: CitizenRecord) {
        let Some(root) = self.root else {
            let id = self.alloc(Node::leaf(record));
            self.root = Some(id);
            self.len = 1;
            return;
        };

        let start = if self.node(root).key_count() == self.max_keys() {
            let mut new_root = Node::default();
            new_root.children.push(root);
            let new_root = self.alloc(new_root);
            self.split_child(new_root, 0);
            self.root = Some(new_root);

            let promoted = self.node(new_root).records[0].id;
            let side = usize::from(promoted < record.id);
            self.node(new_root).children[side]
        } else {
            root
        };

        self.insert_non_full(start, record);
        self.len += 1;
    }

    /// Descends from a node known not to be full and places `record` in a leaf.
    fn insert_non_full(&mut self, start: NodeId, record: CitizenRecord) {
        let max = self.max_keys();
        let mut current = start;
        loop {
            let node = &mut self.nodes[current.index()];
            // records with an equal identifier stay in front of the new one
            let mut pos = node.records.partition_point(|r| r.id <= record.id);
            if node.is_leaf() {
                node.records.insert(pos, record);
                return;
            }

            let child = node.children[pos];
            if self.node(child).key_count() == max {
                self.split_child(current, pos);
                if self.node(current).records[pos].id < record.id {
                    pos += 1;
                }
            }
            current = self.node(current).children[pos];
        }
    }

    /// Splits the full child at `parent.children[i]`.
    ///
    /// The child keeps its first `t - 1` records (and first `t` children), the
    /// median moves up into `parent` at position `i`, and the last `t - 1`
    /// records (and last `t` children) become a new sibling at `i + 1`.
    fn split_child(&mut self, parent: NodeId, i: usize) {
        let t = self.order;
        let child = self.nodes[parent.index()].children[i];

        let (median, right) = {
            let left = &mut self.nodes[child.index()];
            debug_assert_eq!(left.records.len(), 2 * t - 1);
            let mut upper = left.records.split_off(t - 1);
            // upper holds t records (median first); never empty
            let median = upper.remove(0);
            let right_children = if left.is_leaf() {
                Vec::new()
            } else {
                left.children.split_off(t)
            };
            (median, Node::new(upper, right_children))
        };

        let right = self.alloc(right);
        let parent = &mut self.nodes[parent.index()];
        parent.records.insert(i, median);
        parent.children.insert(i + 1, right);
    }

    /// Point lookup by identifier.
    ///
    /// At each node the scan stops at the first record whose identifier is not
    /// below `id`: an equal one is returned, otherwise the search continues in
    /// the child at that position, or ends at a leaf.
    pub fn search(&self, id: &Identifier) -> Option<&CitizenRecord> {
        let mut current = self.root?;
        loop {
            let node = self.node(current);
            let pos = node.records.partition_point(|r| r.id < *id);
            if let Some(found) = node.records.get(pos).filter(|r| r.id == *id) {
                return Some(found);
            }
            if node.is_leaf() {
                return None;
            }
            current = node.children[pos];
        }
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.search(id).is_some()
    }

    /// In-order iterator, ascending by identifier.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Collects every record in ascending identifier order.
    pub fn traverse(&self) -> Vec<CitizenRecord> {
        self.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a BTree {
    type Item = &'a CitizenRecord;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
