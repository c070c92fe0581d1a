//! find_by / find_one_by / find_where give the same answers on every backend

use crate::common::*;

fn seed(lib: &TestLibrary) {
    let books = lib.repo::<Book>();
    let shelf = [
        Book::new("Cien años de soledad", "978-84-376-0494-7")
            .genre("Novela")
            .year(1967)
            .pages(417),
        Book::new("La casa de los espíritus", "978-84-376-0154-0")
            .genre("Novela")
            .year(1982)
            .pages(368),
        Book::new("Ficciones", "0-306-40615-2").genre("Cuento").year(1944),
        Book::new("Veinte poemas de amor", "0-8044-2957-X").year(1924),
    ];
    for book in shelf {
        books.save(book).unwrap();
    }
    let mut lent = books.get(2).unwrap();
    lent.available = false;
    books.update(lent).unwrap();
}

fn titles(books: Vec<Book>) -> Vec<String> {
    books.into_iter().map(|b| b.title).collect()
}

fn filters() -> Vec<Filter> {
    vec![
        Filter::All,
        Filter::eq("genre", "Novela"),
        Filter::ne("genre", "Novela"),
        Filter::gt("year", 1950i64),
        Filter::le("year", 1944.0),
        Filter::contains("title", "DE"),
        Filter::is_null("genre"),
        Filter::is_null("pages").and(Filter::ge("year", 1930i64)),
        Filter::eq("available", false).or(Filter::lt("year", 1930i64)),
        Filter::any_of("isbn", ["0306406152", "9788437604947"]),
        Filter::Not(Box::new(Filter::eq("available", true))),
        Filter::eq("year", "1967"),
    ]
}

#[test]
fn filters_are_format_independent() {
    let reference = TestLibrary::new(BackendKind::Memory);
    seed(&reference);
    let expected: Vec<Vec<String>> = filters()
        .iter()
        .map(|f| titles(reference.repo::<Book>().find_by(f).unwrap()))
        .collect();

    assert_eq!(expected[1], vec!["Cien años de soledad", "La casa de los espíritus"]);
    assert_eq!(expected[6], vec!["Veinte poemas de amor"]);
    assert_eq!(expected[7], vec!["Ficciones"]);
    assert_eq!(expected[9], vec!["Cien años de soledad", "Ficciones"]);
    assert!(expected[11].is_empty());

    for kind in PERSISTENT {
        let lib = TestLibrary::new(kind);
        seed(&lib);
        for (filter, want) in filters().iter().zip(&expected) {
            let got = titles(lib.repo::<Book>().find_by(filter).unwrap());
            assert_eq!(&got, want, "{:?} on {}", filter, kind);
        }
    }
}

#[test]
fn find_one_and_find_where() {
    for kind in PERSISTENT {
        let lib = TestLibrary::new(kind);
        seed(&lib);
        let books = lib.repo::<Book>();

        let first_novel = books
            .find_one_by(&Filter::eq("genre", "Novela"))
            .unwrap()
            .unwrap();
        assert_eq!(first_novel.id, 1, "{}", kind);
        assert!(books
            .find_one_by(&Filter::eq("genre", "Ensayo"))
            .unwrap()
            .is_none());

        let long = books
            .find_where(|b| b.pages.map_or(false, |p| p > 400))
            .unwrap();
        assert_eq!(titles(long), vec!["Cien años de soledad"], "{}", kind);
    }
}

#[test]
fn loans_by_date_range() {
    for kind in PERSISTENT {
        let lib = TestLibrary::new(kind);
        let loans = lib.repo::<Loan>();
        for (day, book) in [(1, 1), (10, 2), (20, 3)] {
            loans
                .save(Loan::new(7, book, date(2024, 4, day), 14))
                .unwrap();
        }
        let april_mid = Filter::ge("loan_date", date(2024, 4, 5))
            .and(Filter::lt("loan_date", date(2024, 4, 20)));
        let found = loans.find_by(&april_mid).unwrap();
        assert_eq!(found.len(), 1, "{}", kind);
        assert_eq!(found[0].book_id, 2);
    }
}
