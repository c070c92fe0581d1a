//! Entity engine for NousData
//!
//! This crate ties the lower layers together:
//! - EngineConfig: backend selection per entity type (`nousdata.toml`)
//! - EntityManager: registry of entity types, cached repositories, stats
//! - Repository / RecordRepository: validated, uniqueness-checked persistence
//!
//! The engine is the only component that knows about:
//! - Which backend and location serve an entity type
//! - When migrations run (once per location, before first use)
//! - Identity allocation on save

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod manager;
pub mod registry;
pub mod repository;
pub mod stats;

pub use config::{Binding, EngineConfig, EntityBackend, CONFIG_FILE_NAME};
pub use manager::{EntityManager, EntityManagerBuilder};
pub use registry::AdapterRegistry;
pub use repository::{RecordRepository, Repository};
pub use stats::EntityStats;
