//! The bookstore domain: authors, books referencing authors, and book stores
//! referencing books.
//!
//! Each entity has a concrete client that dereferences to the generic
//! [`DatabaseClient`](docclient_core::client::DatabaseClient), so every CRUD and
//! query operation is available on it directly. Clients sharing a database must
//! share a backend; with [`InMemoryStore`](docclient_memory::InMemoryStore) that
//! means cloning one store for every client.
//!
//! ```ignore
//! let backend = InMemoryStore::new();
//! let authors = AuthorDatabase::new(backend.clone());
//! let books = BookDatabase::new(backend);
//!
//! let mut king = Author::new("Stephen", "King");
//! authors.store(&mut king).await;
//!
//! let mut it = Book::new(king, vec![9.99]);
//! books.store(&mut it).await;
//! ```

mod author;
mod book;
mod clients;
mod store;

pub use author::Author;
pub use book::Book;
pub use clients::{AuthorDatabase, BookDatabase, BookStoreDatabase};
pub use store::BookStore;

/// Collection names of the bookstore domain.
pub mod collections {
    pub const AUTHORS: &str = "authors";
    pub const BOOKS: &str = "books";
    pub const BOOK_STORES: &str = "bookstores";
}
