//! Unique fields: Book.isbn, User.email, Category.name

use crate::common::*;

#[test]
fn conflicts_on_every_backend() {
    for kind in PERSISTENT.into_iter().chain([BackendKind::Memory]) {
        let lib = TestLibrary::new(kind);

        lib.repo::<User>().save(juan()).unwrap();
        let err = lib
            .repo::<User>()
            .save(User::new("Juana", "Pérez", "juan.perez@email.com"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { ref field, .. } if field == "email"), "{}", kind);

        lib.repo::<Category>().save(Category::new("Novela")).unwrap();
        let err = lib
            .repo::<Category>()
            .save(Category::new("Novela").described("again"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { existing_id: 1, .. }), "{}", kind);

        assert_eq!(lib.repo::<User>().count().unwrap(), 1);
        assert_eq!(lib.repo::<Category>().count().unwrap(), 1);
    }
}

#[test]
fn update_into_taken_value_conflicts() {
    let lib = TestLibrary::new(BackendKind::Text);
    let books = lib.repo::<Book>();
    books.save(cien_anos()).unwrap();
    let mut other = books.save(casa_espiritus()).unwrap();

    other.isbn = "978-84-376-0494-7".to_string();
    assert!(matches!(
        books.update(other.clone()),
        Err(Error::Conflict { existing_id: 1, .. })
    ));
    assert_eq!(books.get(other.id).unwrap().isbn, "9788437601540");
}

#[test]
fn freed_value_can_be_reused() {
    let lib = TestLibrary::new(BackendKind::Sqlite);
    let books = lib.repo::<Book>();
    let first = books.save(cien_anos()).unwrap();
    books.delete(first.id).unwrap();

    let again = books.save(cien_anos()).unwrap();
    assert_eq!(again.id, 2);
    assert_eq!(books.count().unwrap(), 1);
}

#[test]
fn comparison_is_exact() {
    let lib = TestLibrary::new(BackendKind::Json);
    let categories = lib.repo::<Category>();
    categories.save(Category::new("Novela")).unwrap();
    categories.save(Category::new("novela")).unwrap();
    categories.save(Category::new("Novela ")).unwrap();
    assert_eq!(categories.count().unwrap(), 3);
}

#[test]
fn isbn_spellings_of_one_book_conflict() {
    for kind in PERSISTENT {
        let lib = TestLibrary::new(kind);
        let books = lib.repo::<Book>();
        books.save(Book::new("Cien años de soledad", "978-84-376-0494-7")).unwrap();

        for spelling in ["9788437604947", "978 84 376 0494 7"] {
            let err = books.save(Book::new("Otra edición", spelling)).unwrap_err();
            assert!(matches!(err, Error::Conflict { existing_id: 1, .. }), "{}", kind);
        }

        let mut edited = books.save(Book::new("Veinte poemas", "0-8044-2957-X")).unwrap();
        edited.isbn = "0-8044-2957-x".to_string();
        books.update(edited).unwrap();
        assert_eq!(books.get(2).unwrap().isbn, "080442957X");
        assert_eq!(books.count().unwrap(), 2);
    }
}
