//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up sources.

pub mod di;
pub mod error;
pub mod registry;
pub mod toml_source;
pub mod traits;

pub use error::{InfraError, InfraResult};
pub use registry::open_source;
pub use toml_source::TomlSource;
