//! A typed data-access layer over a document database.
//!
//! This crate is the core of the docclient project and provides:
//!
//! - **Identity** ([`identity`]) - Object identifiers and the [`identity::Identified`] trait
//! - **Entities** ([`entity`]) - The capability set a type needs to be stored: collection, pipeline, conversions
//! - **Pipelines** ([`pipeline`]) - Builders for aggregation stages (`$match`, `$lookup`, `$unwind`, `$group`, ...)
//! - **Queries** ([`query`]) - Typed filter expressions translated into `$match` documents
//! - **Backend abstraction** ([`backend`]) - The collection handle verb set implemented by each database backend
//! - **Generic client** ([`client`]) - CRUD and aggregation reads implemented once for every entity
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docclient_core::{client::DatabaseClient, query::Filter};
//!
//! let books = DatabaseClient::<_, Book>::new(backend);
//!
//! let mut book = Book::new(author, vec![10.0]);
//! assert!(books.store(&mut book).await);
//!
//! let by_king = books.find_all(Filter::eq("author.lastName", "King")).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docclient_core;

pub mod backend;
pub mod client;
pub mod entity;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod query;
