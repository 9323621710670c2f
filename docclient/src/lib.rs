//! Main docclient crate: typed clients over a document database.
//!
//! This crate is the primary entry point of the docclient project. It re-exports
//! the generic client and its supporting types from `docclient-core`, the storage
//! backends, and the bookstore domain built on top of them.
//!
//! # Features
//!
//! - **Generic CRUD** - Store, batch store, update, upsert, load and delete any [`entity::Entity`]
//! - **Reference resolution** - Reads are aggregation pipelines that join referenced entities back in
//! - **Typed filters** - Compose [`query::Filter`] expressions, including over joined fields
//! - **Multiple backends** - In-memory storage for tests and MongoDB for production
//!
//! # Quick Start
//!
//! ```ignore
//! use docclient::{prelude::*, bookstore::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let authors = AuthorDatabase::new(backend.clone());
//!     let books = BookDatabase::new(backend.clone());
//!
//!     let mut brown = Author::new("Dan", "Brown");
//!     assert!(authors.store(&mut brown).await);
//!
//!     let mut inferno = Book::new(brown, vec![19.99, 24.99]);
//!     assert!(books.store(&mut inferno).await);
//!
//!     // The author is resolved by the read pipeline.
//!     let found = books.find_by_author_last_name("Brown").await?;
//!     assert_eq!(found.map(|book| book.author.first_name), Some("Dan".to_string()));
//!
//!     backend.shutdown().await
//! }
//! ```
//!
//! # Write results
//!
//! Mutations return `bool` and never fail loudly: the cause of a `false` is
//! logged through `tracing` at `warn` level. Reads return
//! [`error::DocumentStoreResult`].
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod bookstore;
pub mod prelude;

pub use docclient_core::{backend, client, entity, error, identity, pipeline, query};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docclient_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docclient_mongodb::{DbAuth, MongoDbStore, MongoDbStoreBuilder};
}
