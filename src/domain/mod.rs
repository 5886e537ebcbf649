//! Domain layer: the tree core
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod builder;
pub mod entities;
pub mod error;
pub mod graph;
pub mod mutator;
pub mod navigator;
pub mod store;

pub use builder::RelationBuilder;
pub use entities::*;
pub use error::{DomainError, TreeResult};
pub use graph::{RelationGraph, Relations, Siblings, Structure, StructureNode};
pub use mutator::TreeMutator;
pub use navigator::{Nodes, Snapshot};
pub use store::NodeStore;
