use record::Identifier;

use crate::node::NodeId;
use crate::{BTree, BTreeError};

struct Frame {
    id: NodeId,
    depth: usize,
    lo: Option<Identifier>,
    hi: Option<Identifier>,
}

impl BTree {
    /// Verifies the structural invariants of the whole tree.
    ///
    /// Checks, for every node reachable from the root: key count within
    /// `t-1..=2t-1` (root: `1..=2t-1`), records sorted, records within the
    /// separator keys of the parent, `children == keys + 1` for internal nodes,
    /// and one common depth for all leaves. Also checks that every arena node
    /// is reached exactly once, i.e. the arena really is a tree.
    ///
    /// Bounds are inclusive because duplicate identifiers may sit on either
    /// side of an equal separator.
    pub fn check_invariants(&self) -> Result<(), BTreeError> {
        let Some(root) = self.root() else {
            return match self.nodes().len() {
                0 => Ok(()),
                n => Err(BTreeError::Unreachable { unreachable: n }),
            };
        };

        let max = self.max_keys();
        let mut visited = vec![false; self.nodes().len()];
        let mut leaf_depth = None;
        let mut stack = vec![Frame {
            id: root,
            depth: 1,
            lo: None,
            hi: None,
        }];

        while let Some(Frame { id, depth, lo, hi }) = stack.pop() {
            let node = self.get_node(id).ok_or(BTreeError::DanglingChild(id))?;
            if std::mem::replace(&mut visited[id.index()], true) {
                return Err(BTreeError::SharedNode(id));
            }

            let keys = node.key_count();
            if id == root && keys == 0 {
                return Err(BTreeError::EmptyRoot(id));
            }
            let min = if id == root { 1 } else { self.min_keys() };
            if keys < min || keys > max {
                return Err(BTreeError::KeyCount {
                    node: id,
                    keys,
                    min,
                    max,
                });
            }

            let records = node.records();
            if let Some(position) = records.windows(2).position(|w| w[0].id > w[1].id) {
                return Err(BTreeError::Unsorted { node: id, position });
            }
            for r in records {
                let below = lo.is_some_and(|lo| r.id < lo);
                let above = hi.is_some_and(|hi| r.id > hi);
                if below || above {
                    return Err(BTreeError::Separator { node: id, key: r.id });
                }
            }

            if node.is_leaf() {
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(BTreeError::LeafDepth {
                            node: id,
                            depth,
                            expected,
                        });
                    }
                    Some(_) => {}
                }
                continue;
            }

            let children = node.children();
            if children.len() != keys + 1 {
                return Err(BTreeError::ChildCount {
                    node: id,
                    keys,
                    children: children.len(),
                });
            }
            for (i, &child) in children.iter().enumerate() {
                stack.push(Frame {
                    id: child,
                    depth: depth + 1,
                    lo: if i == 0 { lo } else { Some(records[i - 1].id) },
                    hi: records.get(i).map(|r| r.id).or(hi),
                });
            }
        }

        match visited.iter().filter(|v| !**v).count() {
            0 => Ok(()),
            unreachable => Err(BTreeError::Unreachable { unreachable }),
        }
    }
}
