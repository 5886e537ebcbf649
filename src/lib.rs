//! memtree: in-memory hierarchical trees.
//!
//! Flat records `{id, parent_id, prev_id, payload}` go in; a relation
//! graph with parent, child and sibling links, levels and path lookup
//! comes out. Edits rebuild the graph on a copy and publish it whole.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;

pub use application::{MoveReport, SharedTree, Source, SourceKind, Tree};
pub use domain::{
    DomainError, NestedNode, Node, NodeId, NodeState, PathLookup, Payload, Record, Snapshot,
    TreeOptions, TreeResult,
};
