//! Error types and result types for document client operations.
//!
//! Read operations surface these errors to the caller. Write operations keep a
//! boolean contract and only log the error before discarding it, see
//! [`DatabaseClient`](crate::client::DatabaseClient).

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document database.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// Invalid or incomplete connection configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document violates the expected shape or references an unsaved entity.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The string is not a well-formed object identifier.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// The aggregation pipeline or filter uses a construct the backend cannot execute.
    #[error("Unsupported pipeline: {0}")]
    UnsupportedPipeline(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document client operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
