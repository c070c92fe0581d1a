//! Adapter construction and SQLite connection sharing
//!
//! Every entity type on the `sqlite` backend configured with the same
//! database file shares one connection: opening the same path twice returns
//! the same [`SqliteDatabase`]. The registry is owned by its
//! [`EntityManager`](crate::EntityManager); two managers never share
//! connections.

use crate::config::Binding;
use nousdata_core::{EntitySchema, Error, Result};
use nousdata_storage::{
    BackendKind, FileAdapter, FileOptions, LockOptions, MemoryAdapter, SqliteAdapter,
    SqliteDatabase, SqliteOptions, StorageAdapter,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Open SQLite databases keyed by canonical path, plus the adapter factory.
pub struct AdapterRegistry {
    databases: Mutex<HashMap<PathBuf, SqliteDatabase>>,
    lock: LockOptions,
}

impl AdapterRegistry {
    /// Registry using `lock` for every adapter it builds
    pub fn new(lock: LockOptions) -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
            lock,
        }
    }

    /// The shared database for `path`, opening it on first use.
    pub fn database(&self, path: &Path) -> Result<SqliteDatabase> {
        let key = canonical(path)?;

        // Hold the lock for the whole open so one path never gets two connections
        let mut databases = self.databases.lock();
        if let Some(db) = databases.get(&key) {
            return Ok(db.clone());
        }
        let db = SqliteDatabase::open(&key, self.lock)?;
        databases.insert(key, db.clone());
        Ok(db)
    }

    /// Number of distinct SQLite files opened
    pub fn open_databases(&self) -> usize {
        self.databases.lock().len()
    }

    /// Build the adapter for `schema` at `binding`.
    pub fn open_adapter(
        &self,
        schema: Arc<EntitySchema>,
        binding: &Binding,
    ) -> Result<Arc<dyn StorageAdapter>> {
        let initial_version = schema.version();
        let adapter: Arc<dyn StorageAdapter> = match (binding.kind, &binding.path) {
            (BackendKind::Memory, _) => Arc::new(
                MemoryAdapter::new(schema.entity_type(), initial_version)
                    .with_max_records(binding.max_records),
            ),
            (BackendKind::Sqlite, Some(path)) => {
                let db = self.database(path)?;
                let options = SqliteOptions {
                    initial_version,
                    max_records: binding.max_records,
                };
                Arc::new(SqliteAdapter::new(db, schema, options))
            }
            (kind, Some(path)) => {
                let options = FileOptions {
                    initial_version,
                    lock: self.lock,
                    max_records: binding.max_records,
                };
                Arc::new(FileAdapter::open(kind, path.clone(), schema, options)?)
            }
            (kind, None) => {
                return Err(Error::Config(format!(
                    "backend '{}' needs a location",
                    kind
                )))
            }
        };
        info!(
            target: "nousdata::engine",
            backend = %binding.kind,
            location = %adapter.location(),
            "Bound storage adapter"
        );
        Ok(adapter)
    }
}

/// Canonical form of a file that may not exist yet.
fn canonical(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("'{}' is not a file path", path.display())))?;
    Ok(parent.canonicalize()?.join(file_name))
}
