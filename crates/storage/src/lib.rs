//! Storage layer for NousData
//!
//! This crate implements the physical side of entity persistence:
//! - StorageAdapter: uniform record I/O over one physical location
//! - FileAdapter + codecs: JSON, XML, CSV and delimited text documents
//! - SqliteAdapter: one table per entity type in a shared SQLite file
//! - MemoryAdapter: in-process collections
//! - IdentityAllocator: monotonic, never-reused ids per entity type
//!
//! # Durability
//!
//! File adapters replace documents with write-temp, fsync, rename. The
//! SQLite adapter relies on SQLite transactions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod codec;
pub mod file;
pub mod identity;
pub mod memory;
pub mod sqlite;
pub mod testing;

pub use adapter::{BackendKind, Collection, CollectionMeta, LockOptions, RewriteFn, StorageAdapter};
pub use codec::{get_codec, CsvCodec, DocumentCodec, JsonCodec, TextCodec, XmlCodec};
pub use file::{write_atomic, FileAdapter, FileOptions, LocationLock};
pub use identity::IdentityAllocator;
pub use memory::MemoryAdapter;
pub use sqlite::{SqliteAdapter, SqliteDatabase, SqliteOptions};
