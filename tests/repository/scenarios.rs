//! End-to-end library scenarios

use crate::common::*;

/// Empty JSON author collection: ids 1 and 2, stable order, delete(1)
/// leaves 2 loadable.
#[test]
fn json_authors_save_and_delete() {
    let lib = TestLibrary::new(BackendKind::Json);
    let authors = lib.repo::<Author>();

    let first = authors
        .save(Author::new("Gabriel", "García Márquez"))
        .unwrap();
    assert_eq!(first.id, 1);
    let second = authors.save(allende()).unwrap();
    assert_eq!(second.id, 2);

    let all = authors.load_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], first);
    assert_eq!(all[1], second);
    assert_eq!(authors.load_all().unwrap(), all);

    assert!(authors.delete(1).unwrap());
    assert!(authors.load(1).unwrap().is_none());
    assert_eq!(authors.load(2).unwrap(), Some(second));
    assert!(lib.dir.path().join("author.json").exists());
}

/// SQLite book with a stored ISBN: a second book with the same ISBN is a
/// conflict and the count stays 1.
#[test]
fn sqlite_book_isbn_conflict() {
    let lib = TestLibrary::new(BackendKind::Sqlite);
    let books = lib.repo::<Book>();

    let stored = books.save(cien_anos()).unwrap();
    assert_eq!(stored.id, 1);

    let duplicate = Book::new("Otro título", "978-84-376-0494-7");
    let err = books.save(duplicate).unwrap_err();
    match err {
        Error::Conflict {
            entity_type,
            field,
            value,
            existing_id,
        } => {
            assert_eq!(entity_type, "Book");
            assert_eq!(field, "isbn");
            assert_eq!(value, "9788437604947");
            assert_eq!(existing_id, 1);
        }
        other => panic!("expected conflict, got {}", other),
    }
    assert_eq!(books.count().unwrap(), 1);
    assert_eq!(books.get(1).unwrap().title, "Cien años de soledad");
}

#[test]
fn library_walkthrough() {
    let lib = TestLibrary::new(BackendKind::Xml);
    let authors = lib.repo::<Author>();
    let books = lib.repo::<Book>();
    let users = lib.repo::<User>();
    let loans = lib.repo::<Loan>();

    let gabo = authors.save(garcia_marquez()).unwrap();
    let isabel = authors.save(allende()).unwrap();
    let book = books.save(cien_anos().by(gabo.id)).unwrap();
    books.save(casa_espiritus().by(isabel.id)).unwrap();

    let user = match users
        .find_one_by(&Filter::eq("email", "juan.perez@email.com"))
        .unwrap()
    {
        Some(existing) => existing,
        None => users.save(juan()).unwrap(),
    };
    assert_eq!(user.full_name(), "Juan Pérez");

    let loan = loans
        .save(Loan::new(user.id, book.id, date(2024, 5, 1), 14))
        .unwrap();
    assert_eq!(loan.due_date, date(2024, 5, 15));

    let mut lent = books.get(book.id).unwrap();
    lent.available = false;
    books.update(lent).unwrap();

    let returned = loans.update(loan.returned_on(date(2024, 5, 10))).unwrap();
    assert_eq!(loans.get(returned.id).unwrap().status, LoanStatus::Returned);

    let stats = lib.manager.stats().unwrap();
    let counts: Vec<(&str, usize)> = stats
        .iter()
        .map(|s| (s.entity_type.as_str(), s.count))
        .collect();
    assert_eq!(
        counts,
        vec![("Author", 2), ("Book", 2), ("Category", 0), ("Loan", 1), ("User", 1)]
    );
    assert!(stats.iter().all(|s| s.backend == BackendKind::Xml));
}

#[test]
fn restart_does_not_reuse_ids() {
    for kind in PERSISTENT {
        let lib = TestLibrary::new(kind);
        let categories = lib.repo::<Category>();
        categories.save(Category::new("Poesía")).unwrap();
        let drama = categories.save(Category::new("Teatro")).unwrap();
        categories.delete(drama.id).unwrap();
        drop(categories);

        let lib = lib.reopen();
        let categories = lib.repo::<Category>();
        let next = categories.save(Category::new("Ensayo")).unwrap();
        assert_eq!(next.id, 3, "{}", kind);
        assert_eq!(categories.count().unwrap(), 2);
    }
}
