//! Library data written by older code, opened by newer code

use crate::common::*;
use nousdata::{EntitySchema, FieldDef, FieldType};

/// Book as stored by release 2: `year` renamed to `published`, a `format`
/// field added, `pages` dropped.
fn book_v2() -> EntitySchema {
    EntitySchema::new("Book", 2)
        .field(FieldDef::text("title").required())
        .field(FieldDef::text("isbn").required().unique())
        .field(FieldDef::int("author_id"))
        .field(FieldDef::text("genre"))
        .field(FieldDef::int("published"))
        .field(FieldDef::bool("available").default_value(true))
        .field(FieldDef::text("format").default_value("paperback"))
}

/// Release 3 stores the ISBN without hyphens and the year as text.
fn book_v3() -> EntitySchema {
    EntitySchema::new("Book", 3)
        .field(FieldDef::text("title").required())
        .field(FieldDef::text("isbn").required().unique())
        .field(FieldDef::int("author_id"))
        .field(FieldDef::text("genre"))
        .field(FieldDef::text("published"))
        .field(FieldDef::bool("available").default_value(true))
        .field(FieldDef::text("format").default_value("paperback"))
}

fn v1_to_v2() -> Migration {
    Migration::new("Book", 1)
        .rename_field("year", "published")
        .drop_field("pages")
        .add_field("format", "paperback")
}

fn v2_to_v3() -> Migration {
    Migration::new("Book", 2)
        .convert_field("published", FieldType::Text)
        .transform("compact isbn", |record| {
            let isbn = record.text("isbn")?.replace('-', "");
            record.set("isbn", isbn);
            Ok(())
        })
}

fn open(lib: &TestLibrary, schema: EntitySchema, migrations: Vec<Migration>) -> nousdata::Result<EntityManager> {
    let mut config = EngineConfig::with_backend(lib.kind);
    config.data_dir = Some(lib.dir.path().to_path_buf());
    let mut builder = EntityManager::builder().config(config).register_schema(schema);
    for m in migrations {
        builder = builder.migration(m);
    }
    builder.build()
}

fn seeded(kind: BackendKind) -> TestLibrary {
    let lib = TestLibrary::new(kind);
    let books = lib.repo::<Book>();
    books.save(cien_anos()).unwrap();
    books.save(casa_espiritus()).unwrap();
    lib
}

#[test]
fn two_releases_in_one_step() {
    for kind in PERSISTENT {
        let lib = seeded(kind);
        let manager = open(&lib, book_v3(), vec![v1_to_v2(), v2_to_v3()]).unwrap();
        let books = manager.get_repository_by_name("Book").unwrap();

        let first = books.get(1).unwrap();
        assert_eq!(first.text("isbn").unwrap(), "9788437604947", "{}", kind);
        assert_eq!(first.text("published").unwrap(), "1967", "{}", kind);
        assert_eq!(first.text("format").unwrap(), "paperback");
        assert!(!first.contains("pages"));

        let stats = manager.stats().unwrap();
        assert_eq!(stats[0].stored_version, Some(3), "{}", kind);
        assert_eq!(stats[0].count, 2);
    }
}

#[test]
fn release_by_release_matches_combined() {
    for kind in PERSISTENT {
        let stepwise = seeded(kind);
        {
            let m = open(&stepwise, book_v2(), vec![v1_to_v2()]).unwrap();
            m.get_repository_by_name("Book").unwrap();
        }
        let m = open(&stepwise, book_v3(), vec![v1_to_v2(), v2_to_v3()]).unwrap();
        let stepwise_records = m.get_repository_by_name("Book").unwrap().load_all().unwrap();

        let combined = seeded(kind);
        let m = open(&combined, book_v3(), vec![v1_to_v2(), v2_to_v3()]).unwrap();
        let combined_records = m.get_repository_by_name("Book").unwrap().load_all().unwrap();

        assert_eq!(stepwise_records, combined_records, "{}", kind);
    }
}

#[test]
fn ids_survive_migration() {
    let lib = seeded(BackendKind::Csv);
    lib.repo::<Book>().delete(2).unwrap();

    let manager = open(&lib, book_v2(), vec![v1_to_v2()]).unwrap();
    let books = manager.get_repository_by_name("Book").unwrap();
    let saved = books
        .save(
            Record::new()
                .with("title", "El Aleph")
                .with("isbn", "978-84-206-3364-5")
                .with("published", 1949i64),
        )
        .unwrap();
    assert_eq!(saved.id(), 3);
}

#[test]
fn missing_release_blocks_the_book_location_only() {
    let lib = seeded(BackendKind::Json);
    lib.repo::<Author>().save(allende()).unwrap();

    let mut config = EngineConfig::with_backend(BackendKind::Json);
    config.data_dir = Some(lib.dir.path().to_path_buf());
    let manager = EntityManager::builder()
        .config(config)
        .register_schema(book_v3())
        .register::<Author>()
        .migration(v2_to_v3())
        .build()
        .unwrap();

    assert!(matches!(
        manager.get_repository_by_name("Book"),
        Err(Error::MigrationGap { missing_from: 1, .. })
    ));
    assert_eq!(manager.get_repository::<Author>().unwrap().count().unwrap(), 1);
}

#[test]
fn older_code_refuses_newer_data() {
    let lib = seeded(BackendKind::Sqlite);
    {
        let m = open(&lib, book_v2(), vec![v1_to_v2()]).unwrap();
        m.get_repository_by_name("Book").unwrap();
    }
    let lib = lib.reopen();
    assert!(matches!(
        lib.manager.get_repository::<Book>(),
        Err(Error::UnsupportedVersion {
            stored: 2,
            supported: 1,
            ..
        })
    ));
}

#[test]
fn failed_transform_keeps_release_one_data() {
    let lib = seeded(BackendKind::Xml);
    let strict = Migration::new("Book", 1)
        .rename_field("year", "published")
        .drop_field("pages")
        .transform("reject novels", |record| {
            if record.opt_text("genre")?.as_deref() == Some("Novela") {
                return Err(Error::validation("Book", "genre", "novels are not migrated"));
            }
            Ok(())
        });
    let manager = open(&lib, book_v2(), vec![strict]).unwrap();
    assert!(manager.get_repository_by_name("Book").is_err());
    drop(manager);

    let lib = lib.reopen();
    let books = lib.repo::<Book>();
    assert_eq!(books.get(1).unwrap(), {
        let mut b = cien_anos();
        b.id = 1;
        b
    });
}
