//! Integration tests for EntityManager
//!
//! These tests verify the complete manager flow including:
//! - Binding entity types to configured backends
//! - Reopening existing data without reusing ids
//! - Migrations running once before first use
//! - Blocked locations never yielding a repository

use nousdata_core::{EntitySchema, Error, FieldDef, FieldType, Filter, Record, Value};
use nousdata_engine::{EngineConfig, EntityManager};
use nousdata_migration::Migration;
use nousdata_storage::BackendKind;
use std::sync::Arc;
use tempfile::TempDir;

fn member_schema(version: u32) -> EntitySchema {
    let schema = EntitySchema::new("Member", version)
        .field(FieldDef::text("name").required())
        .field(FieldDef::text("email").unique());
    if version >= 2 {
        schema.field(FieldDef::int("tier").default_value(1i64))
    } else {
        schema
    }
}

fn open(dir: &TempDir, kind: BackendKind, version: u32) -> EntityManager {
    EntityManager::builder()
        .config(EngineConfig::with_backend(kind))
        .data_dir(dir.path())
        .register_schema(member_schema(version))
        .migration(Migration::new("Member", 1).add_field("tier", 1i64))
        .build()
        .unwrap()
}

fn member(name: &str, email: &str) -> Record {
    Record::new().with("name", name).with("email", email)
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_reopen_keeps_data_and_counter() {
    for kind in [
        BackendKind::Sqlite,
        BackendKind::Json,
        BackendKind::Xml,
        BackendKind::Csv,
        BackendKind::Text,
    ] {
        let dir = TempDir::new().unwrap();

        // Phase 1: write, delete the newest
        {
            let m = open(&dir, kind, 1);
            let repo = m.get_repository_by_name("Member").unwrap();
            repo.save(member("Ana", "ana@example.org")).unwrap();
            let luis = repo.save(member("Luis", "luis@example.org")).unwrap();
            assert!(repo.delete(luis.id()).unwrap());
        }

        // Phase 2: reopen, ids continue past the deleted one
        {
            let m = open(&dir, kind, 1);
            let repo = m.get_repository_by_name("Member").unwrap();
            assert_eq!(repo.count().unwrap(), 1, "{}", kind);
            let next = repo.save(member("Eva", "eva@example.org")).unwrap();
            assert_eq!(next.id(), 3, "{}", kind);
        }
    }
}

#[test]
fn test_per_entity_backend_override() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::with_backend(BackendKind::Json);
    config.set_backend("Member", BackendKind::Sqlite);

    let m = EntityManager::builder()
        .config(config)
        .data_dir(dir.path())
        .register_schema(member_schema(1))
        .register_schema(EntitySchema::new("Note", 1).field(FieldDef::text("body")))
        .build()
        .unwrap();

    assert_eq!(m.backend_for("Member").unwrap(), BackendKind::Sqlite);
    assert_eq!(m.backend_for("Note").unwrap(), BackendKind::Json);
    assert_eq!(m.entity_types(), vec!["Member", "Note"]);

    m.get_repository_by_name("Note")
        .unwrap()
        .save(Record::new().with("body", "hello"))
        .unwrap();
    assert!(dir.path().join("note.json").exists());
    assert!(!dir.path().join("member.json").exists());
}

// ============================================================================
// Migrations
// ============================================================================

#[test]
fn test_migration_runs_before_first_use() {
    let dir = TempDir::new().unwrap();
    {
        let m = open(&dir, BackendKind::Json, 1);
        m.get_repository_by_name("Member")
            .unwrap()
            .save(member("Ana", "ana@example.org"))
            .unwrap();
    }

    let m = open(&dir, BackendKind::Json, 2);
    let repo = m.get_repository_by_name("Member").unwrap();
    assert_eq!(repo.get(1).unwrap().get("tier"), Some(&Value::Int(1)));

    let stats = m.stats().unwrap();
    assert_eq!(stats[0].stored_version, Some(2));
    assert_eq!(stats[0].schema_version, 2);
}

#[test]
fn test_gap_blocks_location() {
    let dir = TempDir::new().unwrap();
    {
        let m = open(&dir, BackendKind::Csv, 1);
        m.get_repository_by_name("Member")
            .unwrap()
            .save(member("Ana", "ana@example.org"))
            .unwrap();
    }

    // Version 3 code, only 1 -> 2 registered
    let m = EntityManager::builder()
        .config(EngineConfig::with_backend(BackendKind::Csv))
        .data_dir(dir.path())
        .register_schema(member_schema(3))
        .migration(Migration::new("Member", 1).add_field("tier", 1i64))
        .build()
        .unwrap();

    for _ in 0..2 {
        let err = m.get_repository_by_name("Member").unwrap_err();
        assert!(matches!(err, Error::MigrationGap { missing_from: 2, .. }));
    }
    assert!(m.stats().is_err());
}

#[test]
fn test_unsupported_version_blocks_location() {
    let dir = TempDir::new().unwrap();
    {
        let m = open(&dir, BackendKind::Sqlite, 2);
        m.get_repository_by_name("Member")
            .unwrap()
            .save(member("Ana", "ana@example.org"))
            .unwrap();
    }

    let m = open(&dir, BackendKind::Sqlite, 1);
    assert!(matches!(
        m.get_repository_by_name("Member"),
        Err(Error::UnsupportedVersion {
            stored: 2,
            supported: 1,
            ..
        })
    ));
}

#[test]
fn test_eager_migrations_fail_build() {
    let dir = TempDir::new().unwrap();
    {
        let m = open(&dir, BackendKind::Text, 2);
        m.get_repository_by_name("Member")
            .unwrap()
            .save(member("Ana", "ana@example.org"))
            .unwrap();
    }

    let result = EntityManager::builder()
        .config(EngineConfig::with_backend(BackendKind::Text))
        .data_dir(dir.path())
        .register_schema(member_schema(1))
        .eager_migrations(true)
        .build();
    assert!(matches!(result, Err(Error::UnsupportedVersion { .. })));
}

#[test]
fn test_failed_step_is_retried_after_fix() {
    let dir = TempDir::new().unwrap();
    {
        let m = open(&dir, BackendKind::Json, 1);
        m.get_repository_by_name("Member")
            .unwrap()
            .save(member("Ana", "not a number"))
            .unwrap();
    }

    let schema = EntitySchema::new("Member", 2)
        .field(FieldDef::text("name").required())
        .field(FieldDef::int("email"));
    let broken = EntityManager::builder()
        .config(EngineConfig::with_backend(BackendKind::Json))
        .data_dir(dir.path())
        .register_schema(schema)
        .migration(Migration::new("Member", 1).convert_field("email", FieldType::Int))
        .build()
        .unwrap();
    assert!(broken.get_repository_by_name("Member").is_err());
    drop(broken);

    // Old data is intact and the v1 code still works
    let m = open(&dir, BackendKind::Json, 1);
    let repo = m.get_repository_by_name("Member").unwrap();
    assert_eq!(
        repo.find_one_by(&Filter::eq("name", "Ana"))
            .unwrap()
            .unwrap()
            .text("email")
            .unwrap(),
        "not a number"
    );
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn test_manager_shared_across_threads() {
    let dir = TempDir::new().unwrap();
    let m = Arc::new(open(&dir, BackendKind::Json, 1));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                let repo = m.get_repository_by_name("Member").unwrap();
                for i in 0..10 {
                    repo.save(member(&format!("m{}-{}", t, i), &format!("m{}-{}@x.org", t, i)))
                        .unwrap();
                }
                repo
            })
        })
        .collect();
    let repos: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(repos.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    let mut ids: Vec<u64> = repos[0].load_all().unwrap().iter().map(Record::id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=40).collect::<Vec<u64>>());
}

#[test]
fn test_concurrent_unique_saves_admit_one() {
    for kind in [BackendKind::Sqlite, BackendKind::Xml, BackendKind::Memory] {
        let dir = TempDir::new().unwrap();
        let m = Arc::new(open(&dir, kind, 1));
        let barrier = Arc::new(std::sync::Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|t| {
                let m = Arc::clone(&m);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let repo = m.get_repository_by_name("Member").unwrap();
                    barrier.wait();
                    repo.save(member(&format!("racer {}", t), "same@example.org"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1, "{}", kind);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::Conflict { .. })));
        assert_eq!(
            m.get_repository_by_name("Member").unwrap().count().unwrap(),
            1
        );
    }
}

#[test]
fn test_non_finite_amounts_are_never_stored() {
    for kind in BackendKind::ALL {
        let dir = TempDir::new().unwrap();
        let m = EntityManager::builder()
            .config(EngineConfig::with_backend(kind))
            .data_dir(dir.path())
            .register_schema(EntitySchema::new("Fine", 1).field(FieldDef::float("amount")))
            .build()
            .unwrap();
        let fines = m.get_repository_by_name("Fine").unwrap();

        for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = fines.save(Record::new().with("amount", bad)).unwrap_err();
            assert!(
                matches!(err, Error::Validation { ref field, .. } if field == "amount"),
                "{}",
                kind
            );
        }
        assert_eq!(fines.count().unwrap(), 0, "{}", kind);

        let saved = fines.save(Record::new().with("amount", 12.5)).unwrap();
        assert!(fines.find_by(&Filter::is_null("amount")).unwrap().is_empty());
        assert_eq!(fines.load(saved.id()).unwrap(), Some(saved));
    }
}
