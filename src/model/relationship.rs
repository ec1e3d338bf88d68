//! Relationship (edge) in the property graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NodeId, PropertyMap, Value};

/// Opaque relationship identifier: a UUID-v4 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelId(pub String);

impl RelId {
    pub fn new() -> Self {
        RelId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RelId {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RelId {
    fn from(s: String) -> Self { RelId(s) }
}

impl From<&str> for RelId {
    fn from(s: &str) -> Self { RelId(s.to_owned()) }
}

/// Traversal/pattern direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A relationship (directed edge) in the property graph. Endpoints must
/// reference existing nodes at insertion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(id: RelId, src: NodeId, dst: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            src,
            dst,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The "other" end of the relationship from the given node.
    pub fn other_node(&self, from: &NodeId) -> Option<NodeId> {
        if *from == self.src { Some(self.dst.clone()) }
        else if *from == self.dst { Some(self.src.clone()) }
        else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_node_picks_opposite_end() {
        let a = NodeId::new();
        let b = NodeId::new();
        let rel = Relationship::new(RelId::new(), a.clone(), b.clone(), "KNOWS");
        assert_eq!(rel.other_node(&a), Some(b.clone()));
        assert_eq!(rel.other_node(&b), Some(a));
    }
}
