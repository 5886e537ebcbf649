//! TOML record files.
//!
//! ```toml
//! [[node]]
//! id = 1
//! parent_id = 0
//! prev_id = 0
//! [node.payload]
//! name = "A"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt, Source, SourceKind};
use crate::domain::Record;
use crate::infrastructure::traits::FileSystem;

const RAW_ORIGIN: &str = "<raw data>";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    #[serde(default, rename = "node")]
    nodes: Vec<Record>,
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Raw(String),
}

/// Records kept as `[[node]]` tables, in a file or an in-memory document.
pub struct TomlSource {
    location: Location,
    fs: Arc<dyn FileSystem>,
}

impl TomlSource {
    /// Source backed by `path`. A missing file reads as an empty tree.
    pub fn open(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            location: Location::File(path.into()),
            fs,
        }
    }

    /// Source backed by a TOML document held in memory.
    pub fn from_raw(text: impl Into<String>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            location: Location::Raw(text.into()),
            fs,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Raw(_) => None,
        }
    }

    /// The in-memory document, `None` for file sources.
    pub fn raw(&self) -> Option<&str> {
        match &self.location {
            Location::Raw(text) => Some(text),
            Location::File(_) => None,
        }
    }

    pub fn parse(text: &str, origin: &Path) -> ApplicationResult<Vec<Record>> {
        let file: RecordFile = toml::from_str(text).map_err(|e| ApplicationError::InvalidRecords {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(file.nodes)
    }

    pub fn render(records: &[Record]) -> ApplicationResult<String> {
        let file = RecordFile {
            nodes: records.to_vec(),
        };
        toml::to_string_pretty(&file).map_err(|e| ApplicationError::OperationFailed {
            context: "serialize records".into(),
            source: Box::new(e),
        })
    }
}

impl Source for TomlSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Toml
    }

    #[instrument(level = "debug", skip(self))]
    fn setup(&mut self) -> ApplicationResult<Vec<Record>> {
        match &self.location {
            Location::Raw(text) => Self::parse(text, Path::new(RAW_ORIGIN)),
            Location::File(path) => {
                if !self.fs.exists(path) {
                    debug!(path = %path.display(), "no record file, starting empty");
                    return Ok(Vec::new());
                }
                let text = self.fs.read_to_string(path).with_path_context("read records", path)?;
                let records = Self::parse(&text, path)?;
                debug!(path = %path.display(), records = records.len(), "records read");
                Ok(records)
            }
        }
    }

    #[instrument(level = "debug", skip(self, records), fields(records = records.len()))]
    fn store(&mut self, records: &[Record]) -> ApplicationResult<()> {
        let text = Self::render(records)?;
        match &mut self.location {
            Location::Raw(raw) => *raw = text,
            Location::File(path) => {
                self.fs
                    .write_atomic(path, &text)
                    .with_path_context("write records", path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NodeId, Payload};
    use crate::infrastructure::traits::RealFileSystem;

    #[test]
    fn given_node_tables_when_parsing_then_defaults_parent_to_root() {
        let records = TomlSource::parse(
            r#"
[[node]]
id = 1
[node.payload]
name = "A"

[[node]]
id = 2
parent_id = 1
prev_id = 0
[node.payload]
name = "B"
"#,
            Path::new("t.toml"),
        )
        .unwrap();

        assert_eq!(records[0].parent_id, NodeId::ROOT);
        assert_eq!(records[0].prev_id, None);
        assert_eq!(records[1].prev_id, Some(NodeId::ROOT));
        assert_eq!(records[1].payload.name(), Some("B"));
    }

    #[test]
    fn given_malformed_document_when_parsing_then_names_origin() {
        let err = TomlSource::parse("[[node]]\nid = \"x\"", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidRecords { path, .. } if path == Path::new("bad.toml")));
    }

    #[test]
    fn given_raw_source_when_storing_then_document_is_replaced() {
        let mut source = TomlSource::from_raw("", Arc::new(RealFileSystem));
        assert!(source.setup().unwrap().is_empty());

        source
            .store(&[Record::new(3, 0, Payload::named("C")).after(0)])
            .unwrap();

        assert!(source.raw().unwrap().contains("[[node]]"));
        assert_eq!(source.setup().unwrap()[0].id, NodeId::new(3));
    }
}
