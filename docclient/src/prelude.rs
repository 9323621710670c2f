//! Convenient re-exports of commonly used types from docclient.
//!
//! ```ignore
//! use docclient::prelude::*;
//! ```
//!
//! This provides access to:
//! - The generic client and the entity traits
//! - Store backends and builders
//! - Query construction and filtering
//! - Error types

pub use docclient_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    client::DatabaseClient,
    entity::Entity,
    identity::{Identified, is_valid_object_id},
    query::{Expr, Filter, FieldOp, Query, QueryBuilder, Sort, SortDirection},
    error::{DocumentStoreError, DocumentStoreResult},
};
