//! Result-set cache: one blob per bucket per tenancy.
//!
//! The [`CacheStore`] serializes each bucket independently as JSON and hands
//! the blobs to a [`CacheBackend`], a plain key-value interface:
//!
//! - [`FileBackend`]: one file per key in a cache directory
//! - [`DurableBackend`]: a single redb database file
//! - [`MemoryBackend`]: a concurrent in-process map (DashMap)
//!
//! Loading never fails because of the cache's contents: a missing or corrupt
//! bucket comes back empty and is reported in [`CacheLoad`]. A load replaces
//! in-memory buckets wholesale; nothing is merged.

pub mod durable;
pub mod file;
pub mod mem;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::statement::{BucketKind, ResultSet};

pub use durable::DurableBackend;
pub use file::FileBackend;
pub use mem::MemoryBackend;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Key-value storage for cache blobs.
pub trait CacheBackend: Send + Sync {
    /// Store a blob, replacing any previous value.
    fn put(&self, key: &str, blob: &[u8]) -> CacheResult<()>;

    /// Read a blob. `Ok(None)` if the key was never written.
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Delete a key. Returns whether it existed.
    fn remove(&self, key: &str) -> CacheResult<bool>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Which backend to use for the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Redb,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Redb => write!(f, "redb"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown cache backend \"{other}\" (expected file, redb or memory)")),
        }
    }
}

/// Deterministic key for one bucket of one tenancy.
pub fn bucket_key(tenant_id: &str, kind: BucketKind) -> String {
    format!("policy-{}-cache-{tenant_id}", kind.cache_tag())
}

/// What a [`CacheStore::load`] found.
#[derive(Debug, Clone, Default)]
pub struct CacheLoad {
    pub results: ResultSet,
    /// Buckets with no stored blob.
    pub missing: Vec<BucketKind>,
    /// Buckets whose blob could not be read or decoded.
    pub corrupt: Vec<BucketKind>,
}

impl CacheLoad {
    /// Whether any bucket came from the cache at all.
    pub fn found_any(&self) -> bool {
        self.missing.len() + self.corrupt.len() < BucketKind::ALL.len()
    }
}

/// Saves and restores [`ResultSet`]s keyed by tenancy.
pub struct CacheStore {
    backend: Box<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl CacheStore {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Open the configured backend rooted at `cache_dir`.
    pub fn open(kind: BackendKind, cache_dir: &Path) -> CacheResult<Self> {
        let backend: Box<dyn CacheBackend> = match kind {
            BackendKind::File => Box::new(FileBackend::open(cache_dir)?),
            BackendKind::Redb => Box::new(DurableBackend::open(cache_dir)?),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        };
        Ok(Self::new(backend))
    }

    /// In-process cache, lost on exit.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Write all four buckets for `tenant_id`.
    pub fn save(&self, tenant_id: &str, results: &ResultSet) -> CacheResult<()> {
        self.put_bucket(tenant_id, BucketKind::Special, &results.special)?;
        self.put_bucket(tenant_id, BucketKind::DynamicGroup, &results.dynamic_group)?;
        self.put_bucket(tenant_id, BucketKind::Service, &results.service)?;
        self.put_bucket(tenant_id, BucketKind::Regular, &results.regular)?;
        tracing::info!(
            tenant = tenant_id,
            backend = self.backend.name(),
            "saved cache: {}",
            results.counts()
        );
        Ok(())
    }

    /// Read all four buckets for `tenant_id`; absent or unreadable ones are empty.
    pub fn load(&self, tenant_id: &str) -> CacheLoad {
        let mut load = CacheLoad::default();
        load.results.special = self.get_bucket(tenant_id, BucketKind::Special, &mut load);
        load.results.dynamic_group =
            self.get_bucket(tenant_id, BucketKind::DynamicGroup, &mut load);
        load.results.service = self.get_bucket(tenant_id, BucketKind::Service, &mut load);
        load.results.regular = self.get_bucket(tenant_id, BucketKind::Regular, &mut load);
        tracing::info!(
            tenant = tenant_id,
            backend = self.backend.name(),
            "loaded cache: {}",
            load.results.counts()
        );
        load
    }

    /// Delete every bucket for `tenant_id`. Returns how many existed.
    pub fn clear(&self, tenant_id: &str) -> CacheResult<usize> {
        let mut removed = 0;
        for kind in BucketKind::ALL {
            if self.backend.remove(&bucket_key(tenant_id, kind))? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn put_bucket<T: Serialize>(
        &self,
        tenant_id: &str,
        kind: BucketKind,
        items: &[T],
    ) -> CacheResult<()> {
        let blob = serde_json::to_vec(items).map_err(|e| CacheError::Serialization {
            message: format!("{kind} bucket: {e}"),
        })?;
        self.backend.put(&bucket_key(tenant_id, kind), &blob)
    }

    fn get_bucket<T: DeserializeOwned>(
        &self,
        tenant_id: &str,
        kind: BucketKind,
        load: &mut CacheLoad,
    ) -> Vec<T> {
        let key = bucket_key(tenant_id, kind);
        match self.backend.get(&key) {
            Ok(Some(blob)) => match serde_json::from_slice(&blob) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "corrupt cache bucket, treating as empty");
                    load.corrupt.push(kind);
                    Vec::new()
                }
            },
            Ok(None) => {
                tracing::debug!(key = %key, "no cached bucket");
                load.missing.push(kind);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "unreadable cache bucket, treating as empty");
                load.corrupt.push(kind);
                Vec::new()
            }
        }
    }
}
