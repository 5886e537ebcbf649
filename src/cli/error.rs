//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{failed} of {total} moves rejected")]
    PartialMove { failed: usize, total: usize },
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::Infra(InfraError::from(e))
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) => exitcode::USAGE,
            CliError::PartialMove { .. } => exitcode::DATAERR,
            CliError::Infra(InfraError::Application(e)) => match e {
                ApplicationError::Domain(DomainError::NotFound(_)) => exitcode::NOINPUT,
                ApplicationError::Domain(_) => exitcode::DATAERR,
                ApplicationError::InvalidRecords { .. } => exitcode::DATAERR,
                ApplicationError::UnknownSource(_) | ApplicationError::MissingLocation { .. } => {
                    exitcode::USAGE
                }
                ApplicationError::Config { .. } => exitcode::CONFIG,
                ApplicationError::OperationFailed { .. } => exitcode::IOERR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::Source;
    use crate::domain::NodeId;
    use crate::infrastructure::traits::RealFileSystem;
    use crate::infrastructure::TomlSource;

    #[test]
    fn given_domain_errors_when_mapping_exit_codes_then_distinguishes_missing_nodes() {
        let missing = CliError::from(DomainError::NotFound(NodeId::new(7)));
        let cycle = CliError::from(DomainError::CycleDetected(NodeId::new(7)));

        assert_eq!(missing.exit_code(), exitcode::NOINPUT);
        assert_eq!(cycle.exit_code(), exitcode::DATAERR);
    }

    #[test]
    fn given_config_error_when_mapping_exit_code_then_uses_config() {
        let err = CliError::from(ApplicationError::Config {
            message: "bad".into(),
        });
        assert_eq!(err.exit_code(), exitcode::CONFIG);
    }

    #[test]
    fn given_unwritable_record_file_when_storing_then_exits_with_ioerr() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let mut source = TomlSource::open(blocker.join("tree.toml"), Arc::new(RealFileSystem));

        let err = CliError::from(source.store(&[]).unwrap_err());

        assert!(err.to_string().contains("write records"), "got {err}");
        assert_eq!(err.exit_code(), exitcode::IOERR);
    }
}
