//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]

use std::sync::Once;

pub use chrono::NaiveDate;
pub use nousdata::models::{Author, Book, Category, Loan, LoanStatus, User};
pub use nousdata::{
    BackendKind, EngineConfig, Entity, EntityManager, Error, Filter, Migration, Record,
    Repository, Value,
};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness; honours `RUST_LOG`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Backends that persist to disk
pub const PERSISTENT: [BackendKind; 5] = [
    BackendKind::Sqlite,
    BackendKind::Json,
    BackendKind::Xml,
    BackendKind::Csv,
    BackendKind::Text,
];

// ============================================================================
// TestLibrary - manager over a temporary data directory
// ============================================================================

/// Library manager with every entity on one backend.
pub struct TestLibrary {
    pub manager: EntityManager,
    pub kind: BackendKind,
    pub dir: TempDir,
}

impl TestLibrary {
    pub fn new(kind: BackendKind) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("temp dir");
        let manager = Self::open_at(&dir, kind);
        Self { manager, kind, dir }
    }

    fn open_at(dir: &TempDir, kind: BackendKind) -> EntityManager {
        let mut config = EngineConfig::with_backend(kind);
        config.data_dir = Some(dir.path().to_path_buf());
        nousdata::library_manager(config).expect("library manager")
    }

    /// Drop the manager and open a fresh one over the same files
    pub fn reopen(self) -> Self {
        let TestLibrary { manager, kind, dir } = self;
        drop(manager);
        let manager = Self::open_at(&dir, kind);
        Self { manager, kind, dir }
    }

    pub fn repo<T: Entity>(&self) -> Repository<T> {
        self.manager.get_repository::<T>().expect("repository")
    }
}

// ============================================================================
// Sample data
// ============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn garcia_marquez() -> Author {
    Author::new("Gabriel", "García Márquez")
        .born(date(1927, 3, 6))
        .nationality("Colombiano")
}

pub fn allende() -> Author {
    Author::new("Isabel", "Allende")
        .born(date(1942, 8, 2))
        .nationality("Chilena")
}

pub fn cien_anos() -> Book {
    Book::new("Cien años de soledad", "978-84-376-0494-7")
        .genre("Novela")
        .year(1967)
        .pages(417)
}

pub fn casa_espiritus() -> Book {
    Book::new("La casa de los espíritus", "978-84-376-0154-0")
        .genre("Novela")
        .year(1982)
        .pages(368)
}

pub fn juan() -> User {
    User::new("Juan", "Pérez", "juan.perez@email.com")
}
