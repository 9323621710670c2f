//! Collection handle abstraction.
//!
//! [`StoreBackend`] is the minimal verb set the client layer is written against:
//! single and batched inserts, single-document update with an upsert flag,
//! single and bulk deletes, counting and aggregation. Every operation names the
//! collection it targets, so one backend serves every client of a database.
//!
//! # Examples
//!
//! ```ignore
//! use docclient_core::backend::StoreBackend;
//! use bson::doc;
//!
//! let id = backend.insert_one("authors", doc! { "firstName": "Dan" }).await?;
//! let docs = backend
//!     .aggregate("authors", vec![doc! { "$match": { "_id": id } }])
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use std::fmt::Debug;

use crate::error::DocumentStoreResult;

/// Outcome of a single-document update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Number of documents matched by the filter.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
    /// Identifier of the document created by an upsert, if any.
    pub upserted_id: Option<ObjectId>,
}

impl UpdateOutcome {
    /// Returns `true` if a document matched or a new one was created.
    pub fn matched_or_upserted(&self) -> bool {
        self.matched_count > 0 || self.upserted_id.is_some()
    }
}

/// Abstract interface for document database collection handles.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Duplicate keys are reported as
/// [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
/// where the backend can tell them apart, and everything else as
/// [`Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts one document and returns its `_id`.
    ///
    /// A document without `_id` receives a freshly generated [`ObjectId`].
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<ObjectId>;

    /// Inserts all documents in one ordered batch.
    ///
    /// The returned identifiers are in input order: the i-th identifier belongs to
    /// the i-th document. The batch stops at the first failing document; the
    /// documents before it stay stored.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<Vec<ObjectId>>;

    /// Applies `update` (an operator document such as `{ $set: ... }`) to the first
    /// document matching `filter`.
    ///
    /// With `upsert` set and no match, a new document is created from the equality
    /// fields of `filter` and the `$set` fields of `update`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter` and returns the deleted count.
    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter` and returns the deleted count.
    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Counts the documents in a collection.
    async fn count(&self, collection: &str) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline against a collection and collects the results.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Gracefully shuts down the backend, releasing any resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for std::sync::Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<ObjectId> {
        (**self).insert_one(collection, document).await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<Vec<ObjectId>> {
        (**self).insert_many(collection, documents).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        (**self).update_one(collection, filter, update, upsert).await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn count(&self, collection: &str) -> DocumentStoreResult<u64> {
        (**self).count(collection).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self).aggregate(collection, pipeline).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
