//! Core types for NousData
//!
//! This crate defines the foundational types used by every other crate:
//! - Value / FieldType: primitive field values and declared field types
//! - Record: field name → value mapping, the unit storage adapters move
//! - EntitySchema / FieldDef: declared entity shape and schema version
//! - Filter: bounded predicate API evaluated above the storage boundary
//! - Entity: trait implemented by typed domain entities
//! - Error: error taxonomy shared by all layers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod filter;
pub mod record;
pub mod schema;
pub mod value;

pub use entity::Entity;
pub use error::{Error, Result};
pub use filter::Filter;
pub use record::Record;
pub use schema::{EntitySchema, FieldDef, ID_FIELD};
pub use value::{FieldType, Value, DATE_FORMAT};
