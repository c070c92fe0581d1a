//! Per entity type statistics

use nousdata_storage::BackendKind;
use std::fmt;

/// Snapshot of one entity type's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStats {
    /// Registered type name
    pub entity_type: String,
    /// Backend serving it
    pub backend: BackendKind,
    /// Adapter location
    pub location: String,
    /// Stored records
    pub count: usize,
    /// Version marker on disk; `None` until the first write
    pub stored_version: Option<u32>,
    /// Version the registered schema expects
    pub schema_version: u32,
    /// Last id handed out or observed
    pub last_id: u64,
}

impl fmt::Display for EntityStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records on {} ({}), schema v{}",
            self.entity_type, self.count, self.backend, self.location, self.schema_version
        )?;
        match self.stored_version {
            Some(v) if v != self.schema_version => write!(f, ", stored v{}", v),
            _ => Ok(()),
        }
    }
}
