//! Data models for the library

pub mod author;
pub mod book;
pub mod book_loan;
pub mod category;
pub mod dates;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::Book;
pub use book_loan::BookLoan;
pub use category::Category;
pub use loan::Loan;
pub use user::{User, UserClaims};
