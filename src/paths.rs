//! XDG-compliant path resolution for policy-lens.
//!
//! Configuration lives in `$XDG_CONFIG_HOME/policy-lens/` and result caches in
//! `$XDG_CACHE_HOME/policy-lens/`, following the XDG Base Directory
//! Specification.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(lens::paths::no_home),
        help(
            "Set the HOME environment variable, or pass `--config` and `--cache-dir` explicitly."
        )
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(lens::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

const APP_DIR: &str = "policy-lens";

/// Global XDG directories for policy-lens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LensPaths {
    /// `$XDG_CONFIG_HOME/policy-lens/`
    pub config_dir: PathBuf,
    /// `$XDG_CACHE_HOME/policy-lens/`
    pub cache_dir: PathBuf,
}

impl LensPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME").map(PathBuf::from).ok();
        Self::from_vars(
            home,
            std::env::var("XDG_CONFIG_HOME").map(PathBuf::from).ok(),
            std::env::var("XDG_CACHE_HOME").map(PathBuf::from).ok(),
        )
    }

    /// Resolve from explicit values; `HOME` is only needed for unset XDG vars.
    pub fn from_vars(
        home: Option<PathBuf>,
        xdg_config: Option<PathBuf>,
        xdg_cache: Option<PathBuf>,
    ) -> PathResult<Self> {
        let base = |xdg: Option<PathBuf>, fallback: &str| -> PathResult<PathBuf> {
            match xdg.filter(|p| p.is_absolute()) {
                Some(dir) => Ok(dir),
                None => home
                    .as_ref()
                    .map(|h| h.join(fallback))
                    .ok_or(PathError::NoHome),
            }
        };
        Ok(Self {
            config_dir: base(xdg_config, ".config")?.join(APP_DIR),
            cache_dir: base(xdg_cache, ".cache")?.join(APP_DIR),
        })
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.cache_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_vars_take_precedence() {
        let paths = LensPaths::from_vars(
            Some(PathBuf::from("/home/u")),
            Some(PathBuf::from("/xdg/config")),
            Some(PathBuf::from("/xdg/cache")),
        )
        .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/xdg/config/policy-lens"));
        assert_eq!(paths.cache_dir, PathBuf::from("/xdg/cache/policy-lens"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/xdg/config/policy-lens/config.toml")
        );
    }

    #[test]
    fn falls_back_to_home() {
        let paths = LensPaths::from_vars(Some(PathBuf::from("/home/u")), None, None).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/u/.config/policy-lens"));
        assert_eq!(paths.cache_dir, PathBuf::from("/home/u/.cache/policy-lens"));
    }

    #[test]
    fn relative_xdg_values_are_ignored() {
        let paths = LensPaths::from_vars(
            Some(PathBuf::from("/home/u")),
            Some(PathBuf::from("relative")),
            None,
        )
        .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/u/.config/policy-lens"));
    }

    #[test]
    fn no_home_and_no_xdg_is_an_error() {
        assert!(matches!(
            LensPaths::from_vars(None, None, None),
            Err(PathError::NoHome)
        ));
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = LensPaths {
            config_dir: tmp.path().join("config"),
            cache_dir: tmp.path().join("cache"),
        };
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.cache_dir.is_dir());
    }

    #[test]
    fn ensure_dirs_reports_the_blocked_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "").unwrap();
        let paths = LensPaths::from_vars(None, Some(file.clone()), Some(tmp.path().into())).unwrap();

        match paths.ensure_dirs() {
            Err(PathError::CreateDir { path, .. }) => {
                assert_eq!(path, file.join("policy-lens").display().to_string());
            }
            other => panic!("expected CreateDir, got {other:?}"),
        }
    }
}
