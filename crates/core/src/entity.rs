//! The typed entity contract
//!
//! Application types implement [`Entity`] once and can then be persisted
//! through any backend. The repository calls, in order:
//!
//! 1. `to_record()` + schema validation
//! 2. `validate()` for rules the schema cannot express
//! 3. id allocation (when `id() == 0`) and `set_id()`
//! 4. `from_record()` on every load

use crate::error::Result;
use crate::record::Record;
use crate::schema::EntitySchema;

/// A typed, identity-bearing domain record.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Registered type name, e.g. `"Book"`
    const ENTITY_TYPE: &'static str;

    /// Field declarations and expected schema version
    fn schema() -> EntitySchema;

    /// Identity; 0 means "not yet persisted"
    fn id(&self) -> u64;

    /// Assign the identity
    fn set_id(&mut self, id: u64);

    /// Serialize into a record holding every declared field
    fn to_record(&self) -> Record;

    /// Build from a record already conformed to [`Entity::schema`]
    fn from_record(record: &Record) -> Result<Self>;

    /// Entity-specific rules beyond required fields and types
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
