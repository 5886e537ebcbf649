//! Infrastructure-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;

/// Infrastructure errors wrap application errors. File I/O failures
/// arrive as `ApplicationError::OperationFailed` with the path attached.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),
}

impl From<crate::domain::DomainError> for InfraError {
    fn from(e: crate::domain::DomainError) -> Self {
        Self::Application(ApplicationError::Domain(e))
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
