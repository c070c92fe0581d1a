//! In-process adapter
//!
//! Keeps the collection in memory and persists nothing. Used for tests and
//! for entity types configured with the `memory` backend.

use crate::adapter::{
    require_id, BackendKind, Collection, CollectionMeta, RewriteFn, StorageAdapter,
};
use nousdata_core::{Error, Record, Result};
use parking_lot::Mutex;

/// A storage adapter holding one collection in memory.
pub struct MemoryAdapter {
    name: String,
    initial_version: u32,
    max_records: Option<usize>,
    state: Mutex<Option<Collection>>,
}

impl MemoryAdapter {
    /// Empty adapter; `name` is reported as its location.
    pub fn new(name: impl Into<String>, initial_version: u32) -> Self {
        Self {
            name: name.into(),
            initial_version,
            max_records: None,
            state: Mutex::new(None),
        }
    }

    /// Refuse inserts beyond `limit` records
    pub fn with_max_records(mut self, limit: Option<usize>) -> Self {
        self.max_records = limit;
        self
    }

    /// Adapter pre-loaded with `collection`, as if read from disk
    pub fn with_collection(self, collection: Collection) -> Self {
        *self.state.lock() = Some(collection);
        self
    }
}

impl StorageAdapter for MemoryAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn location(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn load_all(&self) -> Result<Vec<Record>> {
        Ok(self
            .state
            .lock()
            .as_ref()
            .map(|c| c.records.clone())
            .unwrap_or_default())
    }

    fn load(&self, id: u64) -> Result<Option<Record>> {
        let state = self.state.lock();
        Ok(state
            .as_ref()
            .and_then(|c| c.position(id).map(|i| c.records[i].clone())))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.state.lock().as_ref().map_or(0, |c| c.records.len()))
    }

    fn save(&self, record: Record) -> Result<Record> {
        let id = require_id(&self.location(), &record)?;
        let mut state = self.state.lock();
        let collection = state.get_or_insert_with(|| Collection::empty(self.initial_version));
        if let Some(limit) = self.max_records {
            if collection.position(id).is_none() && collection.records.len() >= limit {
                return Err(Error::CapacityExceeded {
                    location: self.location(),
                    limit,
                });
            }
        }
        collection.upsert(record.clone());
        Ok(record)
    }

    fn delete(&self, id: u64) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .as_mut()
            .map_or(false, |c| c.remove(id)))
    }

    fn metadata(&self) -> Result<Option<CollectionMeta>> {
        Ok(self.state.lock().as_ref().map(|c| c.meta))
    }

    fn allocate_id(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let collection = state.get_or_insert_with(|| Collection::empty(self.initial_version));
        collection.meta.last_id += 1;
        Ok(collection.meta.last_id)
    }

    fn rewrite(&self, f: &mut RewriteFn<'_>) -> Result<bool> {
        let mut state = self.state.lock();
        match f(state.clone())? {
            Some(next) => {
                *state = Some(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
