//! ACID-durable cache backend backed by redb.
//!
//! All buckets for all tenancies live in one database file inside the cache
//! directory. Writes are transactional, so an interrupted save never leaves a
//! half-written bucket behind.

use std::path::Path;

use redb::{Database, TableDefinition, TableError};

use super::{CacheBackend, CacheResult};
use crate::error::CacheError;

/// Cache blobs keyed by bucket key.
const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("policy_cache");

/// Database file name inside the cache directory.
pub const DB_FILE: &str = "policy-lens.redb";

/// Cache backend using a redb database.
pub struct DurableBackend {
    db: Database,
}

/// Tag a redb failure with the operation that produced it.
fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl Fn(E) -> CacheError {
    move |e| CacheError::Redb {
        message: format!("{op}: {e}"),
    }
}

impl DurableBackend {
    /// Open or create the database in `cache_dir`.
    pub fn open(cache_dir: &Path) -> CacheResult<Self> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.display().to_string(),
            source: e,
        })?;
        let db = Database::create(cache_dir.join(DB_FILE)).map_err(redb_err("open database"))?;
        tracing::debug!(dir = %cache_dir.display(), "opened redb cache");
        Ok(Self { db })
    }
}

impl CacheBackend for DurableBackend {
    fn put(&self, key: &str, blob: &[u8]) -> CacheResult<()> {
        let txn = self.db.begin_write().map_err(redb_err("begin write"))?;
        txn.open_table(CACHE_TABLE)
            .map_err(redb_err("open table"))?
            .insert(key, blob)
            .map_err(redb_err("insert"))?;
        txn.commit().map_err(redb_err("commit"))
    }

    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(redb_err("begin read"))?;
        let table = match txn.open_table(CACHE_TABLE) {
            Ok(table) => table,
            // no bucket has been saved yet
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(redb_err("open table")(e)),
        };
        let blob = table.get(key).map_err(redb_err("get"))?;
        Ok(blob.map(|guard| guard.value().to_vec()))
    }

    fn remove(&self, key: &str) -> CacheResult<bool> {
        let txn = self.db.begin_write().map_err(redb_err("begin write"))?;
        let existed = txn
            .open_table(CACHE_TABLE)
            .map_err(redb_err("open table"))?
            .remove(key)
            .map_err(redb_err("remove"))?
            .is_some();
        txn.commit().map_err(redb_err("commit"))?;
        Ok(existed)
    }

    fn name(&self) -> &'static str {
        "redb"
    }
}

impl std::fmt::Debug for DurableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableBackend").finish()
    }
}
