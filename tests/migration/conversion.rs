//! Moving a collection between formats, and damaged files

use crate::common::*;
use nousdata::{
    convert, Entity, FileAdapter, FileOptions, SqliteAdapter, SqliteDatabase, SqliteOptions,
};
use std::sync::Arc;

#[test]
fn json_library_moves_to_sqlite() {
    let json = TestLibrary::new(BackendKind::Json);
    let books = json.repo::<Book>();
    books.save(cien_anos()).unwrap();
    books.save(casa_espiritus()).unwrap();
    books.delete(1).unwrap();
    let expected = books.load_all().unwrap();

    let schema = Arc::new(Book::schema());
    let from = FileAdapter::open(
        BackendKind::Json,
        json.dir.path().join("book.json"),
        Arc::clone(&schema),
        FileOptions::new(1),
    )
    .unwrap();
    let db = SqliteDatabase::open(json.dir.path().join("nousdata.db"), Default::default()).unwrap();
    let to = SqliteAdapter::new(db, schema, SqliteOptions::new(1));

    let report = convert(&from, &to).unwrap();
    assert_eq!(report.records, 1);
    assert_eq!(report.last_id, 2);
    assert_eq!(report.schema_version, Some(1));
    drop(to);

    // Same directory, now configured for SQLite
    let mut config = EngineConfig::with_backend(BackendKind::Sqlite);
    config.data_dir = Some(json.dir.path().to_path_buf());
    let manager = nousdata::library_manager(config).unwrap();
    let moved = manager.get_repository::<Book>().unwrap();
    assert_eq!(moved.load_all().unwrap(), expected);
    assert_eq!(moved.save(Book::new("Paula", "0-8044-2957-X")).unwrap().id, 3);
}

#[test]
fn convert_refuses_populated_target() {
    let lib = TestLibrary::new(BackendKind::Csv);
    lib.repo::<Category>().save(Category::new("Novela")).unwrap();

    let schema = Arc::new(Category::schema());
    let from = FileAdapter::open(
        BackendKind::Csv,
        lib.dir.path().join("category.csv"),
        Arc::clone(&schema),
        FileOptions::new(1),
    )
    .unwrap();
    let to = FileAdapter::open(
        BackendKind::Csv,
        lib.dir.path().join("category.csv"),
        schema,
        FileOptions::new(1),
    )
    .unwrap();
    assert!(matches!(convert(&from, &to), Err(Error::Config(_))));
}

#[test]
fn truncated_file_is_reported_not_repaired() {
    for (kind, file) in [
        (BackendKind::Json, "author.json"),
        (BackendKind::Xml, "author.xml"),
        (BackendKind::Csv, "author.csv"),
        (BackendKind::Text, "author.txt"),
    ] {
        let lib = TestLibrary::new(kind);
        lib.repo::<Author>().save(garcia_marquez()).unwrap();
        lib.repo::<Author>().save(allende()).unwrap();

        let path = lib.dir.path().join(file);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();

        let err = lib.repo::<Author>().load_all().unwrap_err();
        assert!(matches!(err, Error::Corruption { .. }), "{}: {}", kind, err);
        assert!(lib.repo::<Author>().save(Author::new("Nuevo", "Autor")).is_err());
        assert_eq!(std::fs::read(&path).unwrap().len(), bytes.len() - 7, "{}", kind);
    }
}

#[test]
fn corrupt_file_blocks_fresh_manager() {
    let lib = TestLibrary::new(BackendKind::Json);
    lib.repo::<Author>().save(allende()).unwrap();
    std::fs::write(lib.dir.path().join("author.json"), b"{\"entity\": \"Author\", ").unwrap();

    let lib = lib.reopen();
    assert!(matches!(
        lib.manager.get_repository::<Author>(),
        Err(Error::Corruption { .. })
    ));
    assert!(lib.manager.get_repository::<Book>().is_ok());
}
