//! Fixed registry of data source kinds.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, MemorySource, Source, SourceKind};
use crate::infrastructure::toml_source::TomlSource;
use crate::infrastructure::traits::FileSystem;

/// Opens a source of the given kind. File-backed kinds need a `location`.
pub fn open_source(
    kind: SourceKind,
    location: Option<&Path>,
    fs: Arc<dyn FileSystem>,
) -> ApplicationResult<Box<dyn Source>> {
    debug!(%kind, location = ?location, "opening source");
    match kind {
        SourceKind::Memory => Ok(Box::new(MemorySource::default())),
        SourceKind::Toml => {
            let path = location.ok_or_else(|| ApplicationError::MissingLocation {
                kind: kind.to_string(),
            })?;
            Ok(Box::new(TomlSource::open(path, fs)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::traits::RealFileSystem;

    #[test]
    fn given_toml_without_location_when_opening_then_fails() {
        let result = open_source(SourceKind::Toml, None, Arc::new(RealFileSystem));
        assert!(matches!(result, Err(ApplicationError::MissingLocation { .. })));
    }

    #[test]
    fn given_each_kind_when_opening_then_reports_that_kind() {
        for kind in SourceKind::ALL {
            let source = open_source(kind, Some(Path::new("t.toml")), Arc::new(RealFileSystem)).unwrap();
            assert_eq!(source.kind(), kind);
        }
    }
}
