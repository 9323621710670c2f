use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::ClientOptions,
};
use tracing::{debug, info};

use docclient_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::auth::DbAuth;

const DUPLICATE_KEY: i32 = 11000;


#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Maps a driver error, reporting duplicate keys as `DocumentAlreadyExists`.
fn write_error(err: MongoError, collection: &str) -> DocumentStoreError {
    let duplicate = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::InsertMany(insert) => insert
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY)),
        _ => false,
    };

    if duplicate {
        DocumentStoreError::DocumentAlreadyExists(err.to_string(), collection.to_string())
    } else {
        DocumentStoreError::Backend(err.to_string())
    }
}

fn inserted_object_id(id: &bson::Bson) -> DocumentStoreResult<ObjectId> {
    id.as_object_id()
        .ok_or_else(|| DocumentStoreError::Backend(format!("server returned non-ObjectId identifier {id}")))
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<ObjectId> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| write_error(e, collection))?;

        inserted_object_id(&result.inserted_id)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<Vec<ObjectId>> {
        let expected = documents.len();
        let result = self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| write_error(e, collection))?;

        // The driver reports identifiers keyed by input index.
        let mut ids = result.inserted_ids.into_iter().collect::<Vec<_>>();
        ids.sort_by_key(|(index, _)| *index);

        if ids.len() != expected {
            return Err(DocumentStoreError::Backend(format!(
                "inserted {expected} documents but received {} identifiers",
                ids.len()
            )));
        }

        ids.iter()
            .map(|(_, id)| inserted_object_id(id))
            .collect()
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let result = self.get_collection(collection)
            .update_one(filter, update)
            .upsert(upsert)
            .await
            .map_err(|e| write_error(e, collection))?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id.as_ref().and_then(bson::Bson::as_object_id),
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(filter)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn count(&self, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(doc! {})
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        debug!(collection, stages = pipeline.len(), "aggregate");

        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

enum Connection {
    Dsn(String),
    Auth(DbAuth),
}

/// Builder for [`MongoDbStore`], from a connection string or from [`DbAuth`].
///
/// `build` connects and pings the server, so an unreachable server or bad
/// credentials fail here rather than on the first operation.
pub struct MongoDbStoreBuilder {
    connection: Connection,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            connection: Connection::Dsn(dsn.to_string()),
            database: database.to_string(),
        }
    }

    pub fn from_auth(auth: DbAuth, database: &str) -> Self {
        Self {
            connection: Connection::Auth(auth),
            database: database.to_string(),
        }
    }

    async fn client_options(&self) -> DocumentStoreResult<ClientOptions> {
        match &self.connection {
            Connection::Dsn(dsn) => ClientOptions::parse(dsn)
                .await
                .map_err(|e| DocumentStoreError::Configuration(e.to_string())),
            Connection::Auth(auth) => auth.to_client_options(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = self.client_options().await?;
        let hosts = options
            .hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(hosts = %hosts, database = %self.database, "connected to MongoDB");

        Ok(MongoDbStore::new(client, self.database))
    }
}
