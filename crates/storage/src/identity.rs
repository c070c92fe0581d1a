//! Identity allocation
//!
//! Ids are strictly increasing per entity type, start at 1 and are never
//! reused, not even after deletes or restarts: the counter lives in the
//! location's [`CollectionMeta`](crate::CollectionMeta) and is advanced under
//! the location's exclusive lock.

use crate::adapter::StorageAdapter;
use dashmap::DashMap;
use nousdata_core::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Hands out identities for registered entity types.
#[derive(Default)]
pub struct IdentityAllocator {
    bindings: DashMap<String, Arc<dyn StorageAdapter>>,
}

impl IdentityAllocator {
    /// Allocator with no entity types
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `entity_type` to the adapter whose location stores its counter.
    ///
    /// Re-registering replaces the previous binding.
    pub fn register(&self, entity_type: impl Into<String>, adapter: Arc<dyn StorageAdapter>) {
        self.bindings.insert(entity_type.into(), adapter);
    }

    /// Whether `entity_type` has a binding
    pub fn is_registered(&self, entity_type: &str) -> bool {
        self.bindings.contains_key(entity_type)
    }

    fn adapter(&self, entity_type: &str) -> Result<Arc<dyn StorageAdapter>> {
        self.bindings
            .get(entity_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownEntity(entity_type.to_string()))
    }

    /// Next identity for `entity_type`.
    ///
    /// Concurrent callers never receive the same value.
    pub fn next(&self, entity_type: &str) -> Result<u64> {
        // Clone out of the map so no shard lock is held during file I/O
        let adapter = self.adapter(entity_type)?;
        let id = adapter.allocate_id()?;
        debug!(target: "nousdata::storage", entity_type, id, "Allocated id");
        Ok(id)
    }

    /// Last identity handed out or observed; 0 when none.
    pub fn current(&self, entity_type: &str) -> Result<u64> {
        let adapter = self.adapter(entity_type)?;
        Ok(adapter.metadata()?.map_or(0, |m| m.last_id))
    }
}
