//! Domain entities: node identity, payloads and input records

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Field holding the path segment of a node unless configured otherwise.
pub const DEFAULT_NAME_FIELD: &str = "name";

/// Opaque node identifier.
///
/// `NodeId::ROOT` is the sentinel parent of root-level nodes. It never
/// names a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// Named fields attached to a node. Opaque to the tree core except for
/// the field used as path segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload with only the `name` field set.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with(DEFAULT_NAME_FIELD, name)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(DEFAULT_NAME_FIELD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Flat input record as delivered by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: NodeId,
    /// `NodeId::ROOT` for root-level nodes
    #[serde(default = "root_id")]
    pub parent_id: NodeId,
    /// Preceding sibling; `Some(NodeId::ROOT)` marks the first sibling,
    /// `None` leaves the position to the natural source order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_id: Option<NodeId>,
    #[serde(default)]
    pub payload: Payload,
}

fn root_id() -> NodeId {
    NodeId::ROOT
}

impl Record {
    pub fn new(id: impl Into<NodeId>, parent_id: impl Into<NodeId>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            prev_id: None,
            payload,
        }
    }

    pub fn after(mut self, prev_id: impl Into<NodeId>) -> Self {
        self.prev_id = Some(prev_id.into());
        self
    }
}

/// Node as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub prev_id: Option<NodeId>,
    pub payload: Payload,
    /// Natural (insertion) position, used when no ordering key is present
    pub(crate) seq: u64,
}

impl Node {
    pub fn name(&self) -> Option<&str> {
        self.payload.name()
    }

    pub fn field(&self, field: &str) -> Option<&str> {
        self.payload.get(field)
    }

    pub fn is_root_level(&self) -> bool {
        self.parent_id.is_root()
    }

    pub fn to_record(&self) -> Record {
        Record {
            id: self.id,
            parent_id: self.parent_id,
            prev_id: self.prev_id,
            payload: self.payload.clone(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "({})", self.id),
        }
    }
}

/// Nested payload tree, inserted in one go by `add_subtree`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedNode {
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NestedNode>,
}

impl NestedNode {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: NestedNode) -> Self {
        self.children.push(child);
        self
    }
}

impl Drop for NestedNode {
    fn drop(&mut self) {
        // flatten before dropping so deep nesting does not recurse
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Lifecycle of a node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Stored, not yet part of a published relation graph
    Unattached,
    /// Part of the current relation graph
    Attached,
    /// Removed; the id is never handed out again
    Removed,
}

/// Store insert behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Replace an existing record with the same id
    #[default]
    Upsert,
    /// Fail with `DuplicateId` when the id exists
    Strict,
}

/// Options recognised by the tree at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeOptions {
    /// Whether `remove` cascades when no explicit mode is given
    pub remove_recursively: bool,
    /// Emit rebuild timings
    pub debug: bool,
}

/// Parameters of a path lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLookup {
    /// Search below this node; `None` starts at the first root
    pub start: Option<NodeId>,
    /// Payload field matched against each segment
    pub field: String,
    pub separator: String,
}

impl Default for PathLookup {
    fn default() -> Self {
        Self {
            start: None,
            field: DEFAULT_NAME_FIELD.to_string(),
            separator: "/".to_string(),
        }
    }
}

impl PathLookup {
    pub fn starting_at(mut self, start: NodeId) -> Self {
        self.start = (!start.is_root()).then_some(start);
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_numeric_string_when_parsing_node_id_then_succeeds() {
        assert_eq!("42".parse::<NodeId>().unwrap(), NodeId::new(42));
        assert!("x1".parse::<NodeId>().is_err());
    }

    #[test]
    fn given_record_without_parent_when_deserializing_then_is_root_level() {
        let record: Record = toml::from_str("id = 3\n[payload]\nname = \"A\"\n").unwrap();
        assert_eq!(record.parent_id, NodeId::ROOT);
        assert_eq!(record.prev_id, None);
        assert_eq!(record.payload.name(), Some("A"));
    }

    #[test]
    fn given_root_start_when_building_lookup_then_start_is_cleared() {
        let lookup = PathLookup::default().starting_at(NodeId::ROOT);
        assert_eq!(lookup.start, None);
        let lookup = PathLookup::default().starting_at(NodeId::new(7));
        assert_eq!(lookup.start, Some(NodeId::new(7)));
    }
}
