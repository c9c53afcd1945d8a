//! Bounding-volume tree for terrain region lookup.
//!
//! A binary tree where every leaf is one element and every branch carries
//! the union of its children's bounds, so queries prune whole subtrees.
//! Insertion descends toward the child whose bounds grow least, which keeps
//! the tree loosely balanced for the region shapes the generators emit.

use std::collections::HashMap;

use crate::geom::Rect;

use super::SpatialIndex;

#[derive(Debug)]
enum NodeKind {
    Leaf(u64),
    Branch(usize, usize),
}

#[derive(Debug)]
struct Node {
    bounds: Rect,
    parent: Option<usize>,
    kind: NodeKind,
}

/// AABB tree index. Nodes live in one arena vector with a free list.
#[derive(Debug, Default)]
pub struct AabbTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: Option<usize>,
    leaves: HashMap<u64, usize>,
}

impl AabbTree {
    pub fn new() -> Self {
        AabbTree::default()
    }

    fn alloc(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx] = None;
        self.free.push(idx);
    }

    fn node(&self, idx: usize) -> &Node {
        self.nodes[idx].as_ref().expect("live node index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.nodes[idx].as_mut().expect("live node index")
    }

    /// Walk from a branch toward the leaf whose pairing grows bounds least.
    fn find_sibling(&self, bounds: &Rect) -> usize {
        let mut idx = self.root.expect("called with a non-empty tree");
        loop {
            match self.node(idx).kind {
                NodeKind::Leaf(_) => return idx,
                NodeKind::Branch(left, right) => {
                    let grow = |child: usize| {
                        let b = &self.node(child).bounds;
                        b.union(bounds).area() - b.area()
                    };
                    idx = if grow(left) <= grow(right) { left } else { right };
                }
            }
        }
    }

    /// Recompute branch bounds from `idx` up to the root.
    fn refit(&mut self, mut idx: Option<usize>) {
        while let Some(i) = idx {
            if let NodeKind::Branch(left, right) = self.node(i).kind {
                let bounds = self.node(left).bounds.union(&self.node(right).bounds);
                self.node_mut(i).bounds = bounds;
            }
            idx = self.node(i).parent;
        }
    }

    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: usize) {
        match parent {
            None => self.root = Some(new),
            Some(p) => {
                if let NodeKind::Branch(left, right) = self.node(p).kind {
                    let kind = if left == old {
                        NodeKind::Branch(new, right)
                    } else {
                        NodeKind::Branch(left, new)
                    };
                    self.node_mut(p).kind = kind;
                }
            }
        }
    }

    fn detach(&mut self, id: u64) -> bool {
        let Some(leaf) = self.leaves.remove(&id) else {
            return false;
        };
        let parent = self.node(leaf).parent;
        self.release(leaf);

        match parent {
            None => {
                self.root = None;
            }
            Some(p) => {
                let sibling = match self.node(p).kind {
                    NodeKind::Branch(left, right) => {
                        if left == leaf {
                            right
                        } else {
                            left
                        }
                    }
                    NodeKind::Leaf(_) => unreachable!("leaf parent must be a branch"),
                };
                let grandparent = self.node(p).parent;
                self.node_mut(sibling).parent = grandparent;
                self.replace_child(grandparent, p, sibling);
                self.release(p);
                self.refit(grandparent);
            }
        }
        true
    }
}

impl SpatialIndex for AabbTree {
    fn insert(&mut self, id: u64, bounds: Rect) {
        self.detach(id);

        let leaf = self.alloc(Node {
            bounds,
            parent: None,
            kind: NodeKind::Leaf(id),
        });
        self.leaves.insert(id, leaf);

        let Some(_) = self.root else {
            self.root = Some(leaf);
            return;
        };

        let sibling = self.find_sibling(&bounds);
        let grandparent = self.node(sibling).parent;
        let branch = self.alloc(Node {
            bounds: self.node(sibling).bounds.union(&bounds),
            parent: grandparent,
            kind: NodeKind::Branch(sibling, leaf),
        });
        self.node_mut(sibling).parent = Some(branch);
        self.node_mut(leaf).parent = Some(branch);
        self.replace_child(grandparent, sibling, branch);
        self.refit(grandparent);
    }

    fn remove(&mut self, id: u64) -> bool {
        self.detach(id)
    }

    fn query(&self, area: &Rect) -> Vec<u64> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = self.node(idx);
            if !node.bounds.overlaps(area) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(id) => out.push(id),
                NodeKind::Branch(left, right) => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        out
    }

    fn bounds_of(&self, id: u64) -> Option<Rect> {
        self.leaves.get(&id).map(|leaf| self.node(*leaf).bounds)
    }

    fn elements(&self) -> Vec<(u64, Rect)> {
        let mut out: Vec<(u64, Rect)> = self
            .leaves
            .iter()
            .map(|(id, leaf)| (*id, self.node(*leaf).bounds))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    fn len(&self) -> usize {
        self.leaves.len()
    }
}
