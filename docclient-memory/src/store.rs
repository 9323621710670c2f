//! In-memory storage implementation for document stores.
//!
//! This module provides a backend that keeps every collection as an ordered list
//! of BSON documents behind an async-safe read-write lock.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use docclient_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::{
    evaluator::{DocumentEvaluator, set_path, unset_path},
    pipeline::PipelineExecutor,
};

type StoreMap = HashMap<String, Vec<Document>>;


/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait entirely in memory. Documents
/// keep their insertion order, and every document carries an [`ObjectId`] under
/// `_id`. Aggregations run the supported pipeline stages over a snapshot of the
/// collections, so `$lookup` can join across collections of the same store.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data, which is how several clients share one database.
///
/// # Example
///
/// ```ignore
/// use docclient_memory::InMemoryStore;
/// use docclient_core::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_one("authors", doc! { "firstName": "Dan" }).await?;
///     let docs = store
///         .aggregate("authors", vec![doc! { "$match": { "_id": id } }])
///         .await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// ```ignore
    /// let store = InMemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

/// Assigns a fresh `_id` when missing and checks it is an [`ObjectId`].
fn prepare_document(document: Document) -> DocumentStoreResult<(ObjectId, Document)> {
    let id = match document.get("_id") {
        None => None,
        Some(Bson::ObjectId(id)) => Some(*id),
        Some(other) => {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "_id must be an ObjectId, found {other}"
            )));
        }
    };

    if let Some(id) = id {
        return Ok((id, document));
    }

    let id = ObjectId::new();
    let mut prepared = Document::new();
    prepared.insert("_id", id);
    for (key, value) in document {
        prepared.insert(key, value);
    }

    Ok((id, prepared))
}

fn contains_id(documents: &[Document], id: &ObjectId) -> bool {
    documents
        .iter()
        .any(|doc| matches!(doc.get("_id"), Some(Bson::ObjectId(existing)) if existing == id))
}

/// Applies an update operator document in place.
///
/// `_id` is immutable: setting it to a different value, or unsetting it, fails.
fn apply_update(document: &mut Document, update: &Document) -> DocumentStoreResult<()> {
    for (op, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!("{op} requires a document"))
        })?;

        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if touches_id(path) {
                        if path == "_id" && document.get("_id") == Some(value) {
                            continue;
                        }
                        return Err(immutable_id(path));
                    }
                    set_path(document, path, value.clone())?;
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    if touches_id(path) {
                        return Err(immutable_id(path));
                    }
                    unset_path(document, path);
                }
            }
            other if other.starts_with('$') => {
                return Err(DocumentStoreError::UnsupportedPipeline(format!(
                    "update operator {other}"
                )));
            }
            other => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "update documents may only contain operators, found {other}"
                )));
            }
        }
    }

    Ok(())
}

fn touches_id(path: &str) -> bool {
    path == "_id" || path.starts_with("_id.")
}

fn immutable_id(path: &str) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!(
        "updating the path {path:?} would modify the immutable field _id"
    ))
}

/// Seeds an upserted document with the plain equality fields of `filter`.
fn seed_from_filter(filter: &Document) -> DocumentStoreResult<Document> {
    let mut seed = Document::new();

    for (field, value) in filter {
        if field.starts_with('$') {
            continue;
        }

        let is_operator = value
            .as_document()
            .is_some_and(|inner| inner.keys().any(|key| key.starts_with('$')));

        if !is_operator {
            set_path(&mut seed, field, value.clone())?;
        }
    }

    Ok(seed)
}

fn position_matching(documents: &[Document], filter: &Document) -> DocumentStoreResult<Option<usize>> {
    for (index, document) in documents.iter().enumerate() {
        if DocumentEvaluator::new(document).matches(filter)? {
            return Ok(Some(index));
        }
    }

    Ok(None)
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<ObjectId> {
        let (id, document) = prepare_document(document)?;

        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        if contains_id(documents, &id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
        }

        documents.push(document);
        debug!(collection, id = %id, "inserted document");

        Ok(id)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<Vec<ObjectId>> {
        let mut store = self.store.write().await;
        let existing = store.entry(collection.to_string()).or_default();
        let mut ids = Vec::with_capacity(documents.len());

        // Ordered insert: documents before the first failure stay written.
        for document in documents {
            let (id, document) = prepare_document(document)?;

            if contains_id(existing, &id) {
                debug!(collection, inserted = ids.len(), "batch insert stopped at duplicate");
                return Err(DocumentStoreError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
            }

            existing.push(document);
            ids.push(id);
        }

        debug!(collection, count = ids.len(), "inserted documents");

        Ok(ids)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        if let Some(index) = position_matching(documents, &filter)? {
            let mut updated = documents[index].clone();
            apply_update(&mut updated, &update)?;

            let modified = updated != documents[index];
            documents[index] = updated;

            return Ok(UpdateOutcome {
                matched_count: 1,
                modified_count: u64::from(modified),
                upserted_id: None,
            });
        }

        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut seeded = seed_from_filter(&filter)?;
        apply_update(&mut seeded, &update)?;
        let (id, document) = prepare_document(seeded)?;

        if contains_id(documents, &id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
        }

        documents.push(document);
        debug!(collection, id = %id, "upserted document");

        Ok(UpdateOutcome {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(id),
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        match position_matching(documents, &filter)? {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let matched = documents
            .iter()
            .map(|document| DocumentEvaluator::new(document).matches(&filter))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let deleted = matched.iter().filter(|hit| **hit).count() as u64;
        let mut matched = matched.into_iter();
        documents.retain(|_| !matched.next().unwrap_or(false));

        Ok(deleted)
    }

    async fn count(&self, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        Ok(store.get(collection).map_or(0, |documents| documents.len() as u64))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;

        PipelineExecutor::new(&store).run(collection, &pipeline)
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docclient_memory::InMemoryStore;
/// use docclient_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
