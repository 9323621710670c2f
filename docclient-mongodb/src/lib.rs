//! MongoDB backend implementation for docclient.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Reads run as server-side aggregation pipelines, so references between
//! collections are resolved by MongoDB's `$lookup` in a single round trip.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docclient = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder accepts either a MongoDB connection string or a [`DbAuth`]
//! credential object, and pings the server before handing out the store.
//!
//! # Example
//!
//! ```ignore
//! use docclient::{backend::StoreBackendBuilder, mongodb::{DbAuth, MongoDbStoreBuilder}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = DbAuth::new("localhost", "user", "secret", "admin");
//!     let store = MongoDbStoreBuilder::from_auth(auth, "bookstore")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docclient_mongodb;

pub mod auth;
pub mod store;

pub use auth::DbAuth;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
