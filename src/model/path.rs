//! Path — a sequence of alternating nodes and relationships.

use serde::{Deserialize, Serialize};
use super::{Node, NodeId, RelId, Relationship};

/// A path in the graph: node -[rel]-> node -[rel]-> node ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Nodes along the path. Always has one more element than `relationships`.
    pub nodes: Vec<Node>,
    /// Relationships connecting consecutive nodes.
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn single(node: Node) -> Self {
        Self { nodes: vec![node], relationships: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn start(&self) -> &Node {
        self.nodes.first().expect("Path always has at least one node")
    }

    pub fn end(&self) -> &Node {
        self.nodes.last().expect("Path always has at least one node")
    }

    /// Extend path with a relationship and its target node.
    pub fn append(&mut self, rel: Relationship, node: Node) {
        self.relationships.push(rel);
        self.nodes.push(node);
    }

    /// Returns an iterator over (node, relationship, node) triples along the path.
    pub fn triples(&self) -> impl Iterator<Item = (&Node, &Relationship, &Node)> {
        self.relationships.iter().enumerate().map(move |(i, rel)| {
            (&self.nodes[i], rel, &self.nodes[i + 1])
        })
    }

    /// Reverse the path direction.
    pub fn reverse(&mut self) {
        self.nodes.reverse();
        self.relationships.reverse();
    }

    /// Check if a node (by id) exists anywhere in the path.
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    /// Check if a relationship (by id) exists in the path.
    pub fn contains_relationship(&self, id: &RelId) -> bool {
        self.relationships.iter().any(|r| &r.id == id)
    }

    /// Get a node at a specific position in the path (0-indexed).
    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Get a relationship at a specific position in the path (0-indexed).
    pub fn relationship_at(&self, index: usize) -> Option<&Relationship> {
        self.relationships.get(index)
    }

    /// Return all node IDs in the path, in order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Return all relationship IDs in the path, in order.
    pub fn relationship_ids(&self) -> Vec<RelId> {
        self.relationships.iter().map(|r| r.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn test_node(label: &str) -> Node {
        Node::new(NodeId::new(), label)
    }

    fn test_rel(src: &NodeId, dst: &NodeId) -> Relationship {
        Relationship::new(RelId::new(), src.clone(), dst.clone(), "KNOWS")
    }

    #[test]
    fn test_path_triples() {
        let n1 = test_node("Person");
        let n2 = test_node("Person");
        let n3 = test_node("Person");
        let (id1, id2, id3) = (n1.id.clone(), n2.id.clone(), n3.id.clone());

        let mut path = Path::single(n1);
        path.append(test_rel(&id1, &id2), n2);
        path.append(test_rel(&id2, &id3), n3);

        let triples: Vec<_> = path.triples().collect();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].0.id, id1);
        assert_eq!(triples[0].2.id, id2);
        assert_eq!(triples[1].0.id, id2);
        assert_eq!(triples[1].2.id, id3);
    }

    #[test]
    fn test_path_contains() {
        let n1 = test_node("Person");
        let n2 = test_node("Person");
        let (id1, id2) = (n1.id.clone(), n2.id.clone());
        let rel = test_rel(&id1, &id2);
        let rel_id = rel.id.clone();

        let mut path = Path::single(n1);
        path.append(rel, n2);

        assert!(path.contains_node(&id1));
        assert!(path.contains_node(&id2));
        assert!(!path.contains_node(&NodeId::new()));
        assert!(path.contains_relationship(&rel_id));
        assert!(!path.contains_relationship(&RelId::new()));
    }

    #[test]
    fn test_path_reverse() {
        let n1 = test_node("Person");
        let n2 = test_node("Person");
        let n3 = test_node("Person");
        let (id1, id2, id3) = (n1.id.clone(), n2.id.clone(), n3.id.clone());

        let mut path = Path::single(n1);
        path.append(test_rel(&id1, &id2), n2);
        path.append(test_rel(&id2, &id3), n3);

        assert_eq!(path.start().id, id1);
        assert_eq!(path.end().id, id3);

        path.reverse();
        assert_eq!(path.start().id, id3);
        assert_eq!(path.end().id, id1);
    }

    #[test]
    fn test_path_node_at() {
        let n1 = test_node("Person");
        let n2 = test_node("Person");
        let (id1, id2) = (n1.id.clone(), n2.id.clone());

        let mut path = Path::single(n1);
        path.append(test_rel(&id1, &id2), n2);

        assert_eq!(path.node_at(0).unwrap().id, id1);
        assert_eq!(path.node_at(1).unwrap().id, id2);
        assert!(path.node_at(5).is_none());
    }
}
