//! Node-level encoding of a [`BTree`].
//!
//! Both directions walk the tree with an explicit stack, so very deep or very
//! large trees never recurse on the call stack.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

use btree::{BTree, Node, NodeId};
use record::{CitizenRecord, RECORD_SIZE};

use crate::SnapshotError;

/// Size of a node header: `key_count` (i32) + `is_leaf` (u8).
pub const NODE_HEADER_BYTES: usize = 4 + 1;

fn write_header<W: Write>(w: &mut W, node: &Node) -> io::Result<()> {
    w.write_i32::<LittleEndian>(node.key_count() as i32)?;
    w.write_u8(u8::from(node.is_leaf()))
}

/// Bytes [`encode_tree`] will produce for `tree`.
pub fn encoded_tree_len(tree: &BTree) -> usize {
    NODE_HEADER_BYTES * tree.node_count().max(1) + RECORD_SIZE * tree.len()
}

/// Writes `tree` in pre-order: each node's header, then for every key the
/// record followed (internal nodes only) by the child before that key's
/// successor, then the last child.
///
/// An empty tree is written as a single leaf header with zero keys.
pub fn encode_tree<W: Write>(tree: &BTree, w: &mut W) -> io::Result<()> {
    let Some(root) = tree.root() else {
        w.write_i32::<LittleEndian>(0)?;
        return w.write_u8(1);
    };

    write_header(w, tree.node(root))?;
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

    while let Some(top) = stack.last_mut() {
        let node = tree.node(top.0);
        if node.is_leaf() {
            for r in node.records() {
                w.write_all(&r.encode())?;
            }
            stack.pop();
            continue;
        }

        let slot = top.1;
        if slot < node.key_count() {
            w.write_all(&node.records()[slot].encode())?;
            top.1 += 1;
        } else {
            stack.pop();
        }
        let child = node.children()[slot];
        write_header(w, tree.node(child))?;
        stack.push((child, 0));
    }
    Ok(())
}

/// A node whose header has been read but whose body is still being decoded.
struct Pending {
    id: NodeId,
    keys: usize,
    leaf: bool,
    next: usize,
}

/// Records and child handles of one node under construction.
type Staged = (Vec<CitizenRecord>, Vec<NodeId>);

struct Decoder<'a, 'b> {
    input: &'b mut &'a [u8],
    start: usize,
    max_keys: usize,
}

impl<'a, 'b> Decoder<'a, 'b> {
    fn offset(&self) -> usize {
        self.start - self.input.len()
    }

    fn header(&mut self) -> Result<(usize, bool), SnapshotError> {
        let offset = self.offset();
        let truncated = |_| SnapshotError::Truncated {
            offset,
            what: "node header",
        };
        let key_count = self.input.read_i32::<LittleEndian>().map_err(truncated)?;
        let leaf = self.input.read_u8().map_err(truncated)?;

        if key_count < 0 || key_count as usize > self.max_keys {
            return Err(SnapshotError::InvalidNodeHeader {
                offset,
                key_count,
                max: self.max_keys,
            });
        }
        let leaf = match leaf {
            0 => false,
            1 => true,
            value => return Err(SnapshotError::InvalidLeafFlag { offset, value }),
        };
        Ok((key_count as usize, leaf))
    }

    fn record(&mut self) -> Result<CitizenRecord, SnapshotError> {
        let offset = self.offset();
        let rest: &'a [u8] = *self.input;
        let record = CitizenRecord::decode(rest)
            .map_err(|source| SnapshotError::Record { offset, source })?;
        *self.input = &rest[RECORD_SIZE..];
        Ok(record)
    }
}

fn open(staged: &mut Vec<Staged>, keys: usize, leaf: bool) -> Pending {
    let id = NodeId::new(staged.len() as u32);
    let children = if leaf {
        Vec::new()
    } else {
        Vec::with_capacity(keys + 1)
    };
    staged.push((Vec::with_capacity(keys), children));
    Pending {
        id,
        keys,
        leaf,
        next: 0,
    }
}

/// Rebuilds a tree of order `order` from the front of `input`, advancing
/// `input` past the bytes consumed.
///
/// The rebuilt arena must satisfy every B-tree invariant for `order`;
/// otherwise [`SnapshotError::Tree`] is returned.
pub fn decode_tree(input: &mut &[u8], order: usize) -> Result<BTree, SnapshotError> {
    let empty = BTree::new(order)?;
    let mut dec = Decoder {
        start: input.len(),
        input,
        max_keys: empty.max_keys(),
    };

    let (keys, leaf) = dec.header()?;
    if keys == 0 && leaf {
        return Ok(empty);
    }

    let mut staged: Vec<Staged> = Vec::new();
    let mut stack = vec![open(&mut staged, keys, leaf)];

    while let Some(top) = stack.last_mut() {
        let parent = top.id;
        if top.leaf {
            for _ in 0..top.keys {
                let record = dec.record()?;
                staged[parent.index()].0.push(record);
            }
            stack.pop();
            continue;
        }

        if top.next < top.keys {
            top.next += 1;
            let record = dec.record()?;
            staged[parent.index()].0.push(record);
        } else {
            stack.pop();
        }
        let (keys, leaf) = dec.header()?;
        let child = open(&mut staged, keys, leaf);
        staged[parent.index()].1.push(child.id);
        stack.push(child);
    }

    let nodes = staged
        .into_iter()
        .map(|(records, children)| Node::new(records, children))
        .collect();
    Ok(BTree::from_raw_parts(order, nodes, Some(NodeId::new(0)))?)
}
