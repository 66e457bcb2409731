//! Core identifier types shared by roles, entities and rules

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a role or entity, unique within its kind.
///
/// String and integer ids are distinct: `NodeId::from(1)` and
/// `NodeId::from("1")` never refer to the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    /// Integer id, as used by numeric primary keys
    Int(i64),
    /// String id
    Str(String),
}

impl NodeId {
    /// An empty string id means "no node" in rule fields
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeId::Str(s) if s.is_empty())
    }

    /// Returns the string form, if this is a string id
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeId::Str(s) => Some(s),
            NodeId::Int(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(n) => write!(f, "{}", n),
            NodeId::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::Str(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::Str(s)
    }
}

impl From<&String> for NodeId {
    fn from(s: &String) -> Self {
        NodeId::Str(s.clone())
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        NodeId::Int(n)
    }
}

impl From<i32> for NodeId {
    fn from(n: i32) -> Self {
        NodeId::Int(i64::from(n))
    }
}

impl From<u32> for NodeId {
    fn from(n: u32) -> Self {
        NodeId::Int(i64::from(n))
    }
}

/// Empty parent list, attaching a new node directly to its root
pub const NO_PARENTS: [NodeId; 0] = [];

/// The two independent hierarchies managed by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Actors and groups of actors
    Role,
    /// Protected objects and classes of objects
    Entity,
}

impl NodeKind {
    /// Id of the sentinel node every node of this kind descends from
    pub fn root_id(&self) -> &'static str {
        match self {
            NodeKind::Role => "EVERYONE",
            NodeKind::Entity => "EVERYTHING",
        }
    }

    /// Whether `id` is the root sentinel of this kind
    pub fn is_root(&self, id: &NodeId) -> bool {
        id.as_str() == Some(self.root_id())
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Role => f.write_str("Role"),
            NodeKind::Entity => f.write_str("Entity"),
        }
    }
}

/// Definition of a node supplied by a loader for an id the registry
/// does not know yet.
///
/// An empty parent list is normalized to the root of the kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Parent ids, in order
    #[serde(default)]
    pub parents: Vec<NodeId>,
}

impl NodeRecord {
    /// Create a record with the given parents
    pub fn new<I, P>(parents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<NodeId>,
    {
        Self {
            parents: parents.into_iter().map(Into::into).collect(),
        }
    }
}
