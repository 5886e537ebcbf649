//! Service container for dependency injection
//!
//! Wires settings and I/O implementations into trees and sources.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::{ApplicationResult, Source, SourceKind, Tree};
use crate::config::Settings;
use crate::infrastructure::registry::open_source;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding settings and I/O dependencies.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
        }
    }

    /// `file`, or the configured default record file.
    pub fn record_file(&self, file: Option<&Path>) -> PathBuf {
        file.map(Path::to_path_buf)
            .unwrap_or_else(|| self.settings.default_file.clone())
    }

    pub fn source(&self, kind: SourceKind, file: &Path) -> ApplicationResult<Box<dyn Source>> {
        open_source(kind, Some(file), Arc::clone(&self.fs))
    }

    /// Empty tree with the configured options.
    pub fn tree(&self) -> Tree {
        Tree::new(self.settings.tree_options())
    }

    /// Tree loaded from `source`.
    pub fn load_tree(&self, source: &mut dyn Source) -> ApplicationResult<Tree> {
        let mut tree = self.tree();
        tree.setup(source)?;
        Ok(tree)
    }
}
