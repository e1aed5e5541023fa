//! In-memory cache backend backed by DashMap.
//!
//! Nothing survives process exit. Used for tests and for runs that want the
//! cache interface without touching disk.

use dashmap::DashMap;

use super::{CacheBackend, CacheResult};

/// Concurrent in-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: DashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl CacheBackend for MemoryBackend {
    fn put(&self, key: &str, blob: &[u8]) -> CacheResult<()> {
        self.data.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        Ok(self.data.remove(key).is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
