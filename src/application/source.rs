//! Data source capability: where flat records come from and go back to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::Record;

/// Registered data source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Records held in memory, handed in by the caller
    Memory,
    /// `[[node]]` tables in a TOML document
    #[default]
    Toml,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Memory, SourceKind::Toml];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Memory => "memory",
            SourceKind::Toml => "toml",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ApplicationError::UnknownSource(s.to_string()))
    }
}

/// Something that can hand out a flat record list and take one back.
pub trait Source {
    fn kind(&self) -> SourceKind;

    /// Reads every record, in the order the source holds them.
    fn setup(&mut self) -> ApplicationResult<Vec<Record>>;

    /// Replaces the source contents with `records`.
    fn store(&mut self, records: &[Record]) -> ApplicationResult<()>;
}

/// In-memory source, also the target of raw-data setups.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<Record>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl Source for MemorySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }

    fn setup(&mut self) -> ApplicationResult<Vec<Record>> {
        debug!(records = self.records.len(), "memory source read");
        Ok(self.records.clone())
    }

    fn store(&mut self, records: &[Record]) -> ApplicationResult<()> {
        self.records = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Payload;

    #[test]
    fn given_kind_names_when_parsing_then_ignores_case() {
        assert_eq!("TOML".parse::<SourceKind>().unwrap(), SourceKind::Toml);
        assert_eq!(" memory ".parse::<SourceKind>().unwrap(), SourceKind::Memory);
    }

    #[test]
    fn given_unregistered_name_when_parsing_then_fails() {
        let err = "MDB2".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, ApplicationError::UnknownSource(name) if name == "MDB2"));
    }

    #[test]
    fn given_memory_source_when_storing_then_setup_returns_new_records() {
        let mut source = MemorySource::default();
        source
            .store(&[Record::new(1, 0, Payload::named("A"))])
            .unwrap();

        let records = source.setup().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(source.kind(), SourceKind::Memory);
    }
}
