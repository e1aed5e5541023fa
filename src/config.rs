//! Persistent configuration, stored as TOML.
//!
//! Every field has a serde default so a partial (or empty) file is valid.
//! Command-line flags override file values; the file overrides defaults.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::BackendKind;
use crate::collector::DEFAULT_WORKERS;

/// Errors from loading or saving configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(lens::config::read),
        help("Ensure the config file is readable, or remove it to fall back to defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(lens::config::parse),
        help("Check the TOML syntax. `policy-lens config init --force` writes a fresh default file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(lens::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file already exists: {path}")]
    #[diagnostic(
        code(lens::config::exists),
        help("Pass `--force` to overwrite it.")
    )]
    AlreadyExists { path: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensConfig {
    /// Collector worker threads.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Walk the whole compartment subtree instead of the root only.
    #[serde(default)]
    pub recursive: bool,
    /// Serve results from the cache instead of the data source.
    #[serde(default)]
    pub use_cache: bool,
    #[serde(default)]
    pub cache_backend: BackendKind,
    /// Overrides the XDG cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Tenancy snapshot file used as the data source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Tenancy OCID; defaults to the snapshot's own tenancy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<String>,
}

fn default_threads() -> usize {
    DEFAULT_WORKERS
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            recursive: false,
            use_cache: false,
            cache_backend: BackendKind::default(),
            cache_dir: None,
            source: None,
            tenancy: None,
        }
    }
}

impl LensConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path`, or return defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let config = Self::load(path)?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Write the default config to `path`. Refuses to clobber unless `force`.
    pub fn init(path: &Path, force: bool) -> ConfigResult<Self> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists {
                path: path.display().to_string(),
            });
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = LensConfig::default();
        assert_eq!(cfg.threads, 5);
        assert!(!cfg.recursive);
        assert_eq!(cfg.cache_backend, BackendKind::File);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: LensConfig = toml::from_str("recursive = true\ncache_backend = \"redb\"\n").unwrap();
        assert!(cfg.recursive);
        assert_eq!(cfg.cache_backend, BackendKind::Redb);
        assert_eq!(cfg.threads, 5);
        assert!(cfg.source.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let cfg = LensConfig {
            threads: 12,
            tenancy: Some("ocid1.tenancy.oc1..t".into()),
            source: Some(PathBuf::from("/data/tenancy.json")),
            ..Default::default()
        };
        cfg.save(&path).unwrap();

        let loaded = LensConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = LensConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, LensConfig::default());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "threads = \"many\"").unwrap();
        assert!(matches!(
            LensConfig::load_or_default(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        LensConfig::init(&path, false).unwrap();
        assert!(matches!(
            LensConfig::init(&path, false),
            Err(ConfigError::AlreadyExists { .. })
        ));
        LensConfig::init(&path, true).unwrap();
    }
}
