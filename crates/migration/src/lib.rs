//! Schema migration for NousData
//!
//! This crate evolves stored data across schema versions:
//! - Migration / MigrationStep: one version step for one entity type
//! - MigrationManager: plans and runs migrations against a storage adapter
//! - convert: copies a collection between storage formats

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod manager;
pub mod step;

pub use convert::{convert, ConversionReport};
pub use manager::{MigrationManager, MigrationReport, MigrationState};
pub use step::{Migration, MigrationStep, TransformFn};
