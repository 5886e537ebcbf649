//! Application layer: the tree façade and its data sources
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod error;
pub mod error_ext;
pub mod shared;
pub mod source;
pub mod tree;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use shared::SharedTree;
pub use source::{MemorySource, Source, SourceKind};
pub use tree::{MoveReport, Tree};
