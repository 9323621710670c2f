//! The generic, collection-agnostic client.
//!
//! [`DatabaseClient`] implements every CRUD and query operation once, against the
//! [`Entity`] capability set and a [`StoreBackend`]. Concrete clients only pick the
//! entity type.
//!
//! Writes follow a boolean contract: `false` means nothing was written, whether
//! the input failed validation, nothing matched, or the backend failed. The
//! underlying cause is logged at `warn` level and then dropped. Reads return
//! [`DocumentStoreResult`] and propagate backend failures to the caller.
//!
//! # Example
//!
//! ```ignore
//! use docclient_core::client::DatabaseClient;
//!
//! let authors = DatabaseClient::<_, Author>::new(backend);
//! let mut author = Author::new("Dan", "Brown");
//!
//! assert!(authors.store(&mut author).await);
//! let loaded = authors.load(author.id.as_deref().unwrap()).await?;
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    entity::Entity,
    error::{DocumentStoreError, DocumentStoreResult},
    identity::parse_object_id,
    pipeline::{Pipeline, Stage},
    query::{Expr, Query},
};

/// A typed client for the collection of entity `E`, issuing commands through backend `B`.
#[derive(Debug)]
pub struct DatabaseClient<B: StoreBackend, E: Entity> {
    backend: B,
    _marker: PhantomData<fn() -> E>,
}

impl<B: StoreBackend, E: Entity> DatabaseClient<B, E> {
    /// Creates a client over an already connected backend.
    pub fn new(backend: B) -> Self {
        Self { backend, _marker: PhantomData }
    }

    /// Returns the name of the collection this client manages.
    pub fn collection_name(&self) -> &'static str {
        E::collection_name()
    }

    /// Returns the backend this client issues commands through.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consumes the client and returns its backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Inserts `entity` and assigns the generated identifier to it.
    ///
    /// Returns `false` if the entity cannot be converted to a document or the insert
    /// fails (for example on a duplicate key).
    pub async fn store(&self, entity: &mut E) -> bool {
        let document = match entity.to_document() {
            Ok(document) => document,
            Err(err) => return self.rejected("store", err),
        };

        match self.backend.insert_one(E::collection_name(), document).await {
            Ok(id) => {
                entity.set_id(id.to_hex());
                true
            }
            Err(err) => self.rejected("store", err),
        }
    }

    /// Inserts every entity in one batch and assigns identifiers positionally.
    ///
    /// Returns `false` on empty input, if any entity fails to convert, or if the
    /// batch fails. Identifiers are only assigned when the whole batch succeeded,
    /// although documents ahead of a failing one may already be stored.
    pub async fn store_all(&self, entities: &mut [E]) -> bool {
        if entities.is_empty() {
            return false;
        }

        let documents = match entities
            .iter()
            .map(Entity::to_document)
            .collect::<DocumentStoreResult<Vec<_>>>()
        {
            Ok(documents) => documents,
            Err(err) => return self.rejected("store_all", err),
        };

        let ids = match self.backend.insert_many(E::collection_name(), documents).await {
            Ok(ids) => ids,
            Err(err) => return self.rejected("store_all", err),
        };

        if ids.len() != entities.len() {
            return self.rejected(
                "store_all",
                DocumentStoreError::Backend(format!(
                    "inserted {} documents but received {} identifiers",
                    entities.len(),
                    ids.len()
                )),
            );
        }

        for (entity, id) in entities.iter_mut().zip(ids) {
            entity.set_id(id.to_hex());
        }

        true
    }

    /// Overwrites the stored fields of `entity` with its current values.
    ///
    /// Only the fields produced by [`Entity::to_document`] are written; fields the
    /// stored document has beyond those are left untouched. Returns `true` if a
    /// document with the entity's identifier was found.
    pub async fn update(&self, entity: &E) -> bool {
        let Some(id) = entity.object_id() else {
            return false;
        };

        let fields = match entity.to_document() {
            Ok(document) => without_id(document),
            Err(err) => return self.rejected("update", err),
        };

        match self
            .backend
            .update_one(E::collection_name(), doc! { "_id": id }, doc! { "$set": fields }, false)
            .await
        {
            Ok(outcome) => outcome.matched_count > 0,
            Err(err) => self.rejected("update", err),
        }
    }

    /// Updates the stored document with the entity's identifier, or inserts it.
    ///
    /// An entity without an identifier receives a newly generated one. On success
    /// the entity's identifier is the one the document was written under. Returns
    /// `false` if the existing identifier is malformed or the write fails.
    pub async fn upsert(&self, entity: &mut E) -> bool {
        let id = match entity.id() {
            None => ObjectId::new(),
            Some(id) => match parse_object_id(id) {
                Ok(id) => id,
                Err(err) => return self.rejected("upsert", err),
            },
        };

        let fields = match entity.to_document() {
            Ok(document) => without_id(document),
            Err(err) => return self.rejected("upsert", err),
        };

        match self
            .backend
            .update_one(E::collection_name(), doc! { "_id": id }, doc! { "$set": fields }, true)
            .await
        {
            Ok(outcome) => {
                entity.set_id(id.to_hex());
                outcome.matched_or_upserted()
            }
            Err(err) => self.rejected("upsert", err),
        }
    }

    /// Sets a single field on the document with identifier `id`.
    ///
    /// A malformed identifier matches nothing. Returns `true` if a document matched.
    pub async fn update_field(&self, id: &str, field: &str, value: impl Into<Bson>) -> bool {
        let Ok(id) = parse_object_id(id) else {
            return false;
        };

        match self
            .backend
            .update_one(
                E::collection_name(),
                doc! { "_id": id },
                doc! { "$set": { field: value.into() } },
                false,
            )
            .await
        {
            Ok(outcome) => outcome.matched_count > 0,
            Err(err) => self.rejected("update_field", err),
        }
    }

    /// Loads the entity with identifier `id`.
    ///
    /// Returns `Ok(None)` for an empty identifier or when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidIdentifier`] for a malformed identifier
    /// and propagates backend and conversion failures.
    pub async fn load(&self, id: &str) -> DocumentStoreResult<Option<E>> {
        if id.is_empty() {
            return Ok(None);
        }

        self.aggregate_first(doc! { "_id": parse_object_id(id)? }).await
    }

    /// Loads every entity whose identifier is in `ids`.
    ///
    /// Empty input returns an empty vector without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidIdentifier`] if any identifier is
    /// malformed and propagates backend and conversion failures.
    pub async fn load_all<S: AsRef<str>>(&self, ids: &[S]) -> DocumentStoreResult<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ids
            .iter()
            .map(|id| parse_object_id(id.as_ref()))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.aggregate_all(doc! { "_id": { "$in": ids } }).await
    }

    /// Loads every entity in the collection.
    pub async fn load_everything(&self) -> DocumentStoreResult<Vec<E>> {
        self.aggregate_all(doc! {}).await
    }

    /// Returns the first entity matching `filter`.
    ///
    /// The filter applies to the documents produced by the entity's pipeline, so it
    /// may reach into joined references with dotted paths.
    pub async fn find_first(&self, filter: Expr) -> DocumentStoreResult<Option<E>> {
        self.aggregate_first(filter.to_match()?).await
    }

    /// Returns every entity matching `filter`.
    pub async fn find_all(&self, filter: Expr) -> DocumentStoreResult<Vec<E>> {
        self.aggregate_all(filter.to_match()?).await
    }

    /// Runs a filtered, sorted and paginated read.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<E>> {
        let filter = match &query.filter {
            Some(expr) => expr.to_match()?,
            None => doc! {},
        };

        let mut pipeline = Pipeline::new().stages(E::pipeline(filter));

        if let Some(sort) = &query.sort {
            pipeline = pipeline.stage(Stage::sort(sort));
        }
        if let Some(offset) = query.offset {
            pipeline = pipeline.stage(Stage::skip(offset));
        }
        if let Some(limit) = query.limit {
            pipeline = pipeline.stage(Stage::limit(limit));
        }

        self.run(pipeline.build()).await
    }

    /// Deletes the stored document of `entity`.
    ///
    /// Returns `true` only if exactly one document was removed.
    pub async fn delete(&self, entity: &E) -> bool {
        match entity.id() {
            Some(id) => self.delete_by_id(id).await,
            None => false,
        }
    }

    /// Deletes the document with identifier `id`.
    ///
    /// Returns `true` only if exactly one document was removed.
    pub async fn delete_by_id(&self, id: &str) -> bool {
        let Ok(id) = parse_object_id(id) else {
            return false;
        };

        match self.backend.delete_one(E::collection_name(), doc! { "_id": id }).await {
            Ok(deleted) => deleted == 1,
            Err(err) => self.rejected("delete", err),
        }
    }

    /// Deletes every document in the collection.
    pub async fn remove_all(&self) -> bool {
        match self.backend.delete_many(E::collection_name(), doc! {}).await {
            Ok(deleted) => {
                debug!(collection = E::collection_name(), deleted, "removed all documents");
                true
            }
            Err(err) => self.rejected("remove_all", err),
        }
    }

    /// Returns the number of documents in the collection.
    pub async fn object_count(&self) -> DocumentStoreResult<u64> {
        self.backend.count(E::collection_name()).await
    }

    async fn aggregate_first(&self, filter: Document) -> DocumentStoreResult<Option<E>> {
        Ok(self
            .run(E::pipeline(filter))
            .await?
            .into_iter()
            .next())
    }

    async fn aggregate_all(&self, filter: Document) -> DocumentStoreResult<Vec<E>> {
        self.run(E::pipeline(filter)).await
    }

    async fn run(&self, pipeline: Vec<Document>) -> DocumentStoreResult<Vec<E>> {
        debug!(
            collection = E::collection_name(),
            stages = pipeline.len(),
            "running aggregation"
        );

        self.backend
            .aggregate(E::collection_name(), pipeline)
            .await?
            .iter()
            .map(E::from_document)
            .collect()
    }

    fn rejected(&self, operation: &'static str, err: DocumentStoreError) -> bool {
        warn!(
            collection = E::collection_name(),
            operation,
            error = %err,
            "write rejected"
        );
        false
    }
}

fn without_id(mut document: Document) -> Document {
    document.remove("_id");
    document
}
