//! In-memory document storage backend for docclient.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing without a running database server.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **ObjectId identity** - Inserted documents receive generated `ObjectId`s like on a server
//! - **Update operators** - `$set` and `$unset`, with upsert
//! - **Aggregation** - `$match`, `$lookup`, `$unwind`, `$group`, `$sort`, `$skip` and `$limit`
//!
//! # Quick Start
//!
//! ```ignore
//! use docclient::{bookstore::{Author, AuthorDatabase}, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let authors = AuthorDatabase::new(backend);
//!
//!     let mut author = Author::new("Dan", "Brown");
//!     assert!(authors.store(&mut author).await);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docclient_memory;

mod evaluator;
mod pipeline;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
