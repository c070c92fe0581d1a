//! Library entities
//!
//! Reference consumers of the persistence core: each type declares its
//! schema, unique fields and the rules its schema cannot express.

mod author;
mod book;
mod category;
mod loan;
mod user;

pub use author::Author;
pub use book::{canonical_isbn, isbn_is_valid, Book};
pub use category::Category;
pub use loan::{Loan, LoanStatus};
pub use user::{email_is_valid, User};
