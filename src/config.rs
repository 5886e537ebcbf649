//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/memtree/memtree.toml`
//! 3. Local config: `.memtree.toml` next to the record file
//! 4. Environment variables: `MEMTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{PathLookup, TreeOptions, DEFAULT_NAME_FIELD};

pub const LOCAL_CONFIG_FILE: &str = ".memtree.toml";

/// Raw settings for intermediate parsing. `None` means "not specified".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub remove_recursively: Option<bool>,
    pub debug: Option<bool>,
    pub separator: Option<String>,
    pub name_field: Option<String>,
    pub default_file: Option<PathBuf>,
}

/// Unified configuration for memtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Cascade `remove` when not told otherwise
    pub remove_recursively: bool,
    /// Log rebuild timings at info level
    pub debug: bool,
    /// Path separator for lookups and rendered paths
    pub separator: String,
    /// Payload field used as path segment
    pub name_field: String,
    /// Record file used when `--file` is not given
    pub default_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remove_recursively: false,
            debug: false,
            separator: "/".into(),
            name_field: DEFAULT_NAME_FIELD.into(),
            default_file: PathBuf::from("memtree.toml"),
        }
    }
}

/// Get the XDG config directory for memtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "memtree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("memtree.toml"))
}

/// Get the path to the local config file in `dir`.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

/// Expands `~`, `$VAR` and `${VAR}`. Unresolvable input is returned as is.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Directory holding the record file, searched for `.memtree.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!(path = %global_path.display(), "global config");
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!(path = %local_path.display(), "local config");
                current = current.merge_with(&load_raw_settings(&local_path)?);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;
        Ok(current)
    }

    /// Scalar merge: overlay wins if specified.
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            remove_recursively: overlay.remove_recursively.unwrap_or(self.remove_recursively),
            debug: overlay.debug.unwrap_or(self.debug),
            separator: overlay
                .separator
                .clone()
                .unwrap_or_else(|| self.separator.clone()),
            name_field: overlay
                .name_field
                .clone()
                .unwrap_or_else(|| self.name_field.clone()),
            default_file: overlay
                .default_file
                .clone()
                .unwrap_or_else(|| self.default_file.clone()),
        }
    }

    /// Apply MEMTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("MEMTREE").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("remove_recursively") {
            settings.remove_recursively = val;
        }
        if let Ok(val) = config.get_bool("debug") {
            settings.debug = val;
        }
        if let Ok(val) = config.get_string("separator") {
            settings.separator = val;
        }
        if let Ok(val) = config.get_string("name_field") {
            settings.name_field = val;
        }
        if let Ok(val) = config.get_string("default_file") {
            settings.default_file = PathBuf::from(val);
        }
        Ok(settings)
    }

    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.default_file.to_string_lossy().as_ref());
        self.default_file = PathBuf::from(expanded);
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.separator.is_empty() {
            return Err(ApplicationError::Config {
                message: "separator must not be empty".into(),
            });
        }
        if self.name_field.is_empty() {
            return Err(ApplicationError::Config {
                message: "name_field must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            remove_recursively: self.remove_recursively,
            debug: self.debug,
        }
    }

    /// Path lookup over the configured field and separator.
    pub fn path_lookup(&self) -> PathLookup {
        PathLookup::default()
            .field(self.name_field.clone())
            .separator(self.separator.clone())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# memtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/memtree/memtree.toml
#   Local:  .memtree.toml next to the record file
#   Env:    MEMTREE_* environment variables

# Cascade `remove` without `--recursive`
# remove_recursively = false

# Log rebuild timings
# debug = false

# Separator used in paths
# separator = "/"

# Payload field that names a node in paths
# name_field = "name"

# Record file used when --file is not given
# default_file = "memtree.toml"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_building_options_then_nothing_cascades() {
        let settings = Settings::default();
        assert_eq!(settings.tree_options(), TreeOptions::default());
        assert_eq!(settings.path_lookup(), PathLookup::default());
    }

    #[test]
    fn given_partial_overlay_when_merging_then_only_specified_keys_change() {
        let overlay = RawSettings {
            separator: Some("::".into()),
            remove_recursively: Some(true),
            ..RawSettings::default()
        };

        let merged = Settings::default().merge_with(&overlay);

        assert_eq!(merged.separator, "::");
        assert!(merged.remove_recursively);
        assert_eq!(merged.name_field, "name");
        assert!(!merged.debug);
    }

    #[test]
    fn given_tilde_in_default_file_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            default_file: PathBuf::from("~/trees/main.toml"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        assert!(settings.default_file.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_empty_separator_when_validating_then_fails() {
        let settings = Settings {
            separator: String::new(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ApplicationError::Config { .. })));
    }

    #[test]
    fn given_template_when_parsing_then_is_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).expect("parse template");
        assert!(raw.separator.is_none());
    }

    #[test]
    fn given_template_when_describing_cascade_then_names_only_real_flags() {
        let template = Settings::template();
        assert!(template.contains("Cascade `remove` without `--recursive`"));
        assert!(!template.contains("--recursive="));
    }
}
