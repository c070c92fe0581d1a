//! Repository contract, identical on every backend

use crate::common::*;

fn all_backends() -> impl Iterator<Item = BackendKind> {
    PERSISTENT.into_iter().chain([BackendKind::Memory])
}

#[test]
fn round_trip_every_entity() {
    for kind in all_backends() {
        let lib = TestLibrary::new(kind);

        let author = lib.repo::<Author>().save(garcia_marquez()).unwrap();
        assert_eq!(lib.repo::<Author>().get(author.id).unwrap(), author, "{}", kind);

        let book = lib.repo::<Book>().save(cien_anos().by(author.id)).unwrap();
        assert_eq!(lib.repo::<Book>().get(book.id).unwrap(), book, "{}", kind);

        let user = lib.repo::<User>().save(juan().role("admin")).unwrap();
        assert_eq!(lib.repo::<User>().get(user.id).unwrap(), user, "{}", kind);

        let category = lib
            .repo::<Category>()
            .save(Category::new("Novela | \"realismo\"\nmágico").described("\\N"))
            .unwrap();
        assert_eq!(
            lib.repo::<Category>().get(category.id).unwrap(),
            category,
            "{}",
            kind
        );

        let loan = lib
            .repo::<Loan>()
            .save(Loan::new(user.id, book.id, date(2024, 2, 28), 7))
            .unwrap();
        assert_eq!(lib.repo::<Loan>().get(loan.id).unwrap(), loan, "{}", kind);
    }
}

#[test]
fn optional_fields_round_trip_as_absent() {
    for kind in all_backends() {
        let lib = TestLibrary::new(kind);
        let authors = lib.repo::<Author>();
        let bare = authors.save(Author::new("Anónimo", "-")).unwrap();
        let loaded = authors.get(bare.id).unwrap();
        assert_eq!(loaded.birth_date, None, "{}", kind);
        assert_eq!(loaded.nationality, None, "{}", kind);
    }
}

#[test]
fn save_with_existing_id_replaces() {
    for kind in all_backends() {
        let lib = TestLibrary::new(kind);
        let authors = lib.repo::<Author>();
        let mut author = authors.save(allende()).unwrap();
        author.nationality = Some("Chilena-estadounidense".to_string());
        authors.save(author.clone()).unwrap();

        assert_eq!(authors.count().unwrap(), 1, "{}", kind);
        assert_eq!(authors.get(author.id).unwrap(), author);
    }
}

#[test]
fn presupplied_id_is_kept_and_advances_counter() {
    let lib = TestLibrary::new(BackendKind::Csv);
    let authors = lib.repo::<Author>();
    let mut imported = allende();
    imported.id = 40;
    assert_eq!(authors.save(imported).unwrap().id, 40);
    assert_eq!(authors.save(garcia_marquez()).unwrap().id, 41);
}

#[test]
fn missing_ids() {
    for kind in all_backends() {
        let lib = TestLibrary::new(kind);
        let books = lib.repo::<Book>();
        assert!(books.load(9).unwrap().is_none());
        assert!(!books.exists(9).unwrap());
        assert!(!books.delete(9).unwrap());
        assert!(matches!(
            books.get(9),
            Err(Error::NotFound { id: 9, .. })
        ));

        let mut ghost = cien_anos();
        ghost.id = 9;
        assert!(matches!(
            books.update(ghost),
            Err(Error::NotFound { id: 9, .. })
        ));
        assert!(matches!(
            books.update(cien_anos()),
            Err(Error::NotFound { id: 0, .. })
        ));
        assert_eq!(books.count().unwrap(), 0, "{}", kind);
    }
}

#[test]
fn validation_failures_write_nothing() {
    for kind in all_backends() {
        let lib = TestLibrary::new(kind);

        let err = lib.repo::<Book>().save(Book::new("", "978-84-376-0494-7")).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "title"));

        let err = lib.repo::<Book>().save(Book::new("Rayuela", "978-84-376-0494-8")).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "isbn"));

        let err = lib
            .repo::<User>()
            .save(User::new("Juan", "Pérez", "juan.perez"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "email"));

        let mut loan = Loan::new(1, 1, date(2024, 1, 10), 3);
        loan.due_date = date(2024, 1, 1);
        let err = lib.repo::<Loan>().save(loan).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "due_date"));

        for stats in lib.manager.stats().unwrap() {
            assert_eq!(stats.count, 0, "{} on {}", stats.entity_type, kind);
            assert_eq!(stats.last_id, 0, "{} on {}", stats.entity_type, kind);
        }
    }
}

#[test]
fn untyped_repository_rejects_undeclared_fields() {
    let lib = TestLibrary::new(BackendKind::Json);
    let records = lib.manager.get_repository_by_name("Category").unwrap();
    let err = records
        .save(Record::new().with("name", "Poesía").with("shelf", 4i64))
        .unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "shelf"));

    let saved = records.save(Record::new().with("name", "Poesía")).unwrap();
    assert_eq!(saved.id(), 1);
    assert_eq!(
        lib.repo::<Category>().get(1).unwrap(),
        Category {
            id: 1,
            name: "Poesía".to_string(),
            description: None,
        }
    );
}
