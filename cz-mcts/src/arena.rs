//! Arena storage for search nodes.
//!
//! One arena per tree. Nodes refer to each other through `NodeId` indices,
//! which keeps the tree free of ownership cycles even though nodes carry
//! parent back-references.

use crate::node::{Node, NodeId};

#[derive(Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, n: Node) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(n);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Compact the arena down to the subtree rooted at `new_root`, freeing
    /// every node outside it. Returns the id of the new root (always 0).
    ///
    /// Ids are remapped in traversal order, which also restores locality
    /// after a long game.
    pub fn promote(&mut self, new_root: NodeId) -> NodeId {
        let mut kept: Vec<Node> = Vec::new();
        let mut frontier: Vec<NodeId> = vec![new_root];

        // First pass: copy reachable nodes, recording old -> new.
        let mut old_ids: Vec<NodeId> = Vec::new();
        while let Some(old) = frontier.pop() {
            old_ids.push(old);
            let node = self.nodes[old as usize].clone();
            for &c in &node.children {
                frontier.push(c);
            }
            kept.push(node);
        }

        let mut remap: Vec<NodeId> = vec![NodeId::MAX; self.nodes.len()];
        for (new_id, &old) in old_ids.iter().enumerate() {
            remap[old as usize] = new_id as NodeId;
        }

        // Second pass: rewrite child and parent links.
        for node in kept.iter_mut() {
            for c in node.children.iter_mut() {
                *c = remap[*c as usize];
            }
            node.parent = node.parent.map(|p| remap[p as usize]);
        }
        kept[0].parent = None;

        self.nodes = kept;
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_keeps_only_the_subtree() {
        let mut arena = Arena::new();
        let root = arena.push(Node::root(-1.0));
        let a = arena.push(Node::child(0, root, 1.0, 0.5));
        let b = arena.push(Node::child(1, root, 1.0, 0.5));
        arena.get_mut(root).children = vec![a, b];
        let aa = arena.push(Node::child(2, a, -1.0, 1.0));
        arena.get_mut(a).children = vec![aa];
        arena.get_mut(a).visits = 3;

        let new_root = arena.promote(a);
        assert_eq!(new_root, 0);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(new_root).visits, 3);
        assert!(arena.get(new_root).parent.is_none());

        let child = arena.get(new_root).children[0];
        assert_eq!(arena.get(child).action, 2);
        assert_eq!(arena.get(child).parent, Some(new_root));
    }
}
