//! Many threads sharing one manager

use crate::common::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_saves_get_distinct_ids() {
    for kind in PERSISTENT {
        let lib = TestLibrary::new(kind);
        let manager = &lib.manager;
        let barrier = Barrier::new(4);

        let ids: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        let authors = manager.get_repository::<Author>().unwrap();
                        barrier.wait();
                        (0..8)
                            .map(|i| {
                                authors
                                    .save(Author::new(format!("A{}", t), format!("{}", i)))
                                    .unwrap()
                                    .id
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let distinct: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), 32, "{}", kind);
        assert_eq!(distinct, (1..=32).collect::<HashSet<u64>>(), "{}", kind);
        assert_eq!(lib.repo::<Author>().count().unwrap(), 32);
    }
}

#[test]
fn racing_registrations_admit_one_email() {
    let lib = Arc::new(TestLibrary::new(BackendKind::Sqlite));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let lib = Arc::clone(&lib);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let users = lib.repo::<User>();
                barrier.wait();
                users.save(User::new(format!("Juan {}", t), "Pérez", "juan.perez@email.com"))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(lib.repo::<User>().count().unwrap(), 1);
}

#[test]
fn readers_never_see_partial_documents() {
    let lib = TestLibrary::new(BackendKind::Json);
    let categories = lib.repo::<Category>();
    categories.save(Category::new("seed")).unwrap();

    thread::scope(|s| {
        let writer = s.spawn(|| {
            for i in 0..40 {
                categories
                    .save(Category::new(format!("c{}", i)).described("x".repeat(200)))
                    .unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..40 {
                    let n = categories.load_all().unwrap().len();
                    assert!((1..=41).contains(&n));
                }
            });
        }
        writer.join().unwrap();
    });
    assert_eq!(categories.count().unwrap(), 41);
}
