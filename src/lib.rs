//! NousData - typed entity persistence over interchangeable storage backends
//!
//! Application code defines entities once and persists them through SQLite,
//! JSON, XML, CSV, delimited text or memory without changing calling code.
//!
//! # Quick Start
//!
//! ```ignore
//! use nousdata::models::{Author, Book};
//! use nousdata::{BackendKind, EngineConfig, EntityManager};
//!
//! let mut config = EngineConfig::with_backend(BackendKind::Json);
//! config.set_backend("Book", BackendKind::Sqlite);
//!
//! let manager = EntityManager::builder()
//!     .config(config)
//!     .data_dir("library-data")
//!     .register::<Author>()
//!     .register::<Book>()
//!     .build()?;
//!
//! let authors = manager.get_repository::<Author>()?;
//! let gabo = authors.save(Author::new("Gabriel", "García Márquez"))?;
//! assert_eq!(gabo.id, 1);
//! ```
//!
//! # Architecture
//!
//! All access goes through [`EntityManager`], which hands out one shared
//! [`Repository`] per entity type after migrating its stored data.
//! Storage adapters and migrations are re-exported for tools that need
//! them directly (format conversion, custom backends).

pub mod models;

pub use nousdata_core::{
    Entity, EntitySchema, Error, FieldDef, FieldType, Filter, Record, Result, Value,
};
pub use nousdata_engine::{
    EngineConfig, EntityBackend, EntityManager, EntityManagerBuilder, EntityStats,
    RecordRepository, Repository, CONFIG_FILE_NAME,
};
pub use nousdata_migration::{
    convert, ConversionReport, Migration, MigrationManager, MigrationReport, MigrationStep,
};
pub use nousdata_storage::{
    BackendKind, CollectionMeta, FileAdapter, FileOptions, IdentityAllocator, LockOptions,
    MemoryAdapter, SqliteAdapter, SqliteDatabase, SqliteOptions, StorageAdapter,
};

/// Manager with every library entity registered, on `config`.
pub fn library_manager(config: EngineConfig) -> Result<EntityManager> {
    EntityManager::builder()
        .config(config)
        .register::<models::Author>()
        .register::<models::Book>()
        .register::<models::Category>()
        .register::<models::User>()
        .register::<models::Loan>()
        .build()
}
