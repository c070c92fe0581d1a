//! The storage adapter contract
//!
//! Every physical format implements [`StorageAdapter`]. Repositories depend
//! only on this trait, never on a concrete format.
//!
//! ## Location metadata
//!
//! Each location stores, next to its records, a [`CollectionMeta`]: the
//! schema version marker read by the migration manager and the identity
//! counter used by the identity allocator. A location that has never been
//! written has no metadata at all; the first write stamps it with the
//! version the running code expects.
//!
//! ## Concurrency
//!
//! Mutating calls (`save`, `delete`, `allocate_id`, `rewrite`) hold the
//! location's exclusive lock for the whole read-modify-write. Acquisition is
//! retried per [`LockOptions`] and surfaces `Error::Concurrency` when
//! exhausted.

use nousdata_core::{EntitySchema, Error, Record, Result, Value, ID_FIELD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Physical storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational engine (SQLite), one table per entity type
    Sqlite,
    /// One JSON document per entity type
    Json,
    /// One XML document per entity type
    Xml,
    /// One CSV file per entity type
    Csv,
    /// One pipe-delimited text file per entity type
    Text,
    /// In-process only, nothing persisted
    Memory,
}

impl BackendKind {
    /// All kinds, in documentation order
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Sqlite,
        BackendKind::Json,
        BackendKind::Xml,
        BackendKind::Csv,
        BackendKind::Text,
        BackendKind::Memory,
    ];

    /// Configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Json => "json",
            BackendKind::Xml => "xml",
            BackendKind::Csv => "csv",
            BackendKind::Text => "text",
            BackendKind::Memory => "memory",
        }
    }

    /// Parse a configuration name. `txt` is accepted for `text`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(BackendKind::Sqlite),
            "json" => Some(BackendKind::Json),
            "xml" => Some(BackendKind::Xml),
            "csv" => Some(BackendKind::Csv),
            "text" | "txt" => Some(BackendKind::Text),
            "memory" => Some(BackendKind::Memory),
            _ => None,
        }
    }

    /// Default file extension for file-based kinds
    pub fn file_extension(&self) -> Option<&'static str> {
        match self {
            BackendKind::Json => Some("json"),
            BackendKind::Xml => Some("xml"),
            BackendKind::Csv => Some("csv"),
            BackendKind::Text => Some("txt"),
            BackendKind::Sqlite => Some("db"),
            BackendKind::Memory => None,
        }
    }

    /// Whether the whole collection lives in a single rewritten file
    pub fn is_document(&self) -> bool {
        matches!(
            self,
            BackendKind::Json | BackendKind::Xml | BackendKind::Csv | BackendKind::Text
        )
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema version marker and identity counter of one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionMeta {
    /// Schema version of the stored records
    pub schema_version: u32,
    /// Highest id ever allocated or observed
    pub last_id: u64,
}

impl CollectionMeta {
    /// Metadata for a brand new location
    pub fn fresh(schema_version: u32) -> Self {
        Self {
            schema_version,
            last_id: 0,
        }
    }

    /// Raise `last_id` to at least `id`
    pub fn observe(&mut self, id: u64) {
        self.last_id = self.last_id.max(id);
    }
}

/// The full contents of one location.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection {
    /// Version marker and identity counter
    pub meta: CollectionMeta,
    /// Records in backend order
    pub records: Vec<Record>,
}

impl Collection {
    /// Empty collection stamped with `schema_version`
    pub fn empty(schema_version: u32) -> Self {
        Self {
            meta: CollectionMeta::fresh(schema_version),
            records: Vec::new(),
        }
    }

    /// Position of the record with `id`
    pub fn position(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    /// Insert or replace by id, advancing `last_id`. Returns true when inserted.
    pub fn upsert(&mut self, record: Record) -> bool {
        self.meta.observe(record.id());
        match self.position(record.id()) {
            Some(i) => {
                self.records[i] = record;
                false
            }
            None => {
                self.records.push(record);
                true
            }
        }
    }

    /// Remove by id. Returns true when a record was removed.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.position(id) {
            Some(i) => {
                self.records.remove(i);
                true
            }
            None => false,
        }
    }
}

/// Callback used by [`StorageAdapter::rewrite`].
///
/// Receives the current collection (`None` when the location has no data)
/// and returns the replacement, or `None` to leave the location untouched.
pub type RewriteFn<'a> = dyn FnMut(Option<Collection>) -> Result<Option<Collection>> + 'a;

/// Lock acquisition policy for mutating calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Attempts after the first one
    pub retries: u32,
    /// Pause between attempts
    pub retry_interval: Duration,
}

impl LockOptions {
    /// Upper bound on the time spent waiting for the lock
    pub fn total_wait(&self) -> Duration {
        self.retry_interval * (self.retries + 1)
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            retries: 50,
            retry_interval: Duration::from_millis(20),
        }
    }
}

/// Uniform record persistence over one physical location.
pub trait StorageAdapter: Send + Sync {
    /// Physical format
    fn kind(&self) -> BackendKind;

    /// Human readable location (file path, or database path and table)
    fn location(&self) -> String;

    /// Every record, in backend order
    fn load_all(&self) -> Result<Vec<Record>>;

    /// One record by id
    fn load(&self, id: u64) -> Result<Option<Record>> {
        Ok(self.load_all()?.into_iter().find(|r| r.id() == id))
    }

    /// Write the full record (insert or replace by id) and return it unchanged.
    ///
    /// The record must carry a non-zero id. The stored identity counter is
    /// raised to at least that id.
    fn save(&self, record: Record) -> Result<Record>;

    /// Remove a record. True iff it existed.
    fn delete(&self, id: u64) -> Result<bool>;

    /// Whether a record with `id` is stored
    fn exists(&self, id: u64) -> Result<bool> {
        Ok(self.load(id)?.is_some())
    }

    /// Number of stored records
    fn count(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    /// Version marker and identity counter; `None` when never written
    fn metadata(&self) -> Result<Option<CollectionMeta>>;

    /// Allocate the next identity under the location lock
    fn allocate_id(&self) -> Result<u64>;

    /// Whole-collection read-modify-write under the location lock.
    ///
    /// Returns true when the location was rewritten.
    fn rewrite(&self, f: &mut RewriteFn<'_>) -> Result<bool>;
}

/// Reject records that cannot be stored by id.
pub(crate) fn require_id(location: &str, record: &Record) -> Result<u64> {
    match record.id() {
        0 => Err(Error::validation(
            location,
            ID_FIELD,
            "record has no id; allocate one before saving",
        )),
        id => Ok(id),
    }
}

/// Type the declared fields of a freshly decoded record.
///
/// Declared fields whose raw value cannot be converted keep the raw value,
/// so pre-migration data still loads; the repository's schema conformance
/// rejects whatever survives migration untyped. The id must always convert.
pub(crate) fn apply_declared_types(
    schema: &EntitySchema,
    record: Record,
) -> std::result::Result<Record, String> {
    let mut out = Record::new();
    for (name, value) in record {
        let typed = match schema.field_def(&name) {
            Some(def) => match value.clone().coerce(def.field_type) {
                Ok(v) => v,
                Err(e) if name == ID_FIELD => return Err(e),
                Err(_) => value,
            },
            None => value,
        };
        out.set(name, typed);
    }
    if out.id() == 0 && !matches!(out.get(ID_FIELD), Some(Value::Int(_))) {
        return Err("record without an id".to_string());
    }
    Ok(out)
}
