//! File-per-bucket cache backend.
//!
//! Each key becomes `.{key}.json` in the cache directory, e.g.
//! `.policy-dg-cache-ocid1.tenancy.oc1..aaaa.json`. Writes go to a temporary
//! sibling first and are renamed into place.

use std::path::{Path, PathBuf};

use super::{CacheBackend, CacheResult};
use crate::error::CacheError;

/// Cache backend storing one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir` as the cache directory, creating it if needed.
    pub fn open(dir: &Path) -> CacheResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// On-disk location for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.json", sanitize(key)))
    }
}

/// Keep file names portable: anything outside `[A-Za-z0-9._-]` becomes `_`.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl CacheBackend for FileBackend {
    fn put(&self, key: &str, blob: &[u8]) -> CacheResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, blob).map_err(|e| CacheError::Io {
            path: tmp.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| CacheError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), bytes = blob.len(), "wrote cache file");
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
