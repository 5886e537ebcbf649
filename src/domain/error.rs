//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::NodeId;

/// Domain errors represent violated tree invariants.
/// A failed operation leaves the published tree untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("parent {parent} of node {child} not found")]
    ParentNotFound { child: NodeId, parent: NodeId },

    #[error("invalid parent {parent} for node {id}: node would become its own ancestor")]
    InvalidParent { id: NodeId, parent: NodeId },

    #[error("node {0} has children; remove it recursively")]
    HasChildren(NodeId),

    #[error("inconsistent sibling order below {parent}: {reason}")]
    InconsistentOrder { parent: NodeId, reason: String },

    #[error("cycle detected in parent chain at node {0}")]
    CycleDetected(NodeId),

    #[error("node id {0} is reserved for the root sentinel")]
    ReservedId(NodeId),

    #[error("node id {0} was removed and cannot be reused")]
    Retired(NodeId),
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, DomainError>;
