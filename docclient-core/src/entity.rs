//! The capability set a type needs to be managed by a [`DatabaseClient`](crate::client::DatabaseClient).
//!
//! An [`Entity`] names its collection, converts itself to and from a BSON
//! [`Document`], and supplies the aggregation stages that resolve its references
//! on read. The generic client is implemented once against this trait.
//!
//! # Example
//!
//! ```ignore
//! use bson::{Document, doc};
//! use docclient_core::{entity::Entity, identity::Identified, error::DocumentStoreResult};
//!
//! #[derive(Debug, Clone, Default)]
//! pub struct Tag {
//!     pub id: Option<String>,
//!     pub label: String,
//! }
//!
//! impl Identified for Tag {
//!     fn id(&self) -> Option<&str> { self.id.as_deref() }
//!     fn set_id(&mut self, id: String) { self.id = Some(id); }
//! }
//!
//! impl Entity for Tag {
//!     fn collection_name() -> &'static str { "tags" }
//!
//!     fn to_document(&self) -> DocumentStoreResult<Document> {
//!         Ok(with_object_id(self, doc! { "label": &self.label }))
//!     }
//!
//!     fn from_document(document: &Document) -> DocumentStoreResult<Self> {
//!         Ok(Tag {
//!             id: read_object_id(document)?,
//!             label: document.get_str("label")?.to_string(),
//!         })
//!     }
//! }
//! ```

use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    identity::Identified,
    pipeline::Stage,
};

/// Core trait that every entity stored through a client must implement.
pub trait Entity: Identified + Clone + Debug + Send + Sync + 'static {
    /// Returns the name of the collection this entity is stored in.
    fn collection_name() -> &'static str;

    /// Returns the read pipeline for this entity, ending in `$match` on `filter`.
    ///
    /// The default has no references to resolve and is the match stage alone.
    /// Entities that store references to other collections prepend the join,
    /// unwind and group stages that turn stored identifiers back into documents.
    fn pipeline(filter: Document) -> Vec<Document> {
        vec![Stage::match_(filter)]
    }

    /// Converts this entity into the document persisted in its collection.
    ///
    /// Nested entities are replaced by their identifiers. `_id` is present only when
    /// the entity already has a well-formed identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be represented, for example when it
    /// references an entity that was never stored.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Reconstructs an entity from a document produced by [`Entity::pipeline`].
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or has the wrong type.
    fn from_document(document: &Document) -> DocumentStoreResult<Self>;
}

/// Prepends `_id` to `document` when `entity` has a well-formed identifier.
pub fn with_object_id<E: Identified + ?Sized>(entity: &E, document: Document) -> Document {
    match entity.object_id() {
        Some(oid) => {
            let mut with_id = Document::new();
            with_id.insert("_id", oid);
            for (key, value) in document {
                with_id.insert(key, value);
            }
            with_id
        }
        None => document,
    }
}

/// Reads `_id` as a hex identifier, or `None` when the document has no `_id`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if `_id` is not an object id.
pub fn read_object_id(document: &Document) -> DocumentStoreResult<Option<String>> {
    match document.get("_id") {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::ObjectId(oid)) => Ok(Some(oid.to_hex())),
        Some(other) => Err(DocumentStoreError::InvalidDocument(format!(
            "expected an object id in _id, found {other}"
        ))),
    }
}

/// Reads a numeric field as `f64`, accepting any BSON number type.
pub fn read_f64(value: &Bson) -> DocumentStoreResult<f64> {
    match value {
        Bson::Double(value) => Ok(*value),
        Bson::Int32(value) => Ok(f64::from(*value)),
        Bson::Int64(value) => Ok(*value as f64),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a number, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    #[derive(Default)]
    struct Sample {
        id: Option<String>,
    }

    impl Identified for Sample {
        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
    }

    #[test]
    fn test_with_object_id_skips_missing_identifier() {
        let document = with_object_id(&Sample::default(), doc! { "name": "x" });

        assert!(!document.contains_key("_id"));
    }

    #[test]
    fn test_with_object_id_puts_id_first() {
        let oid = ObjectId::new();
        let sample = Sample { id: Some(oid.to_hex()) };
        let document = with_object_id(&sample, doc! { "name": "x" });

        assert_eq!(document.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(document.get_object_id("_id").unwrap(), oid);
    }

    #[test]
    fn test_read_object_id() {
        let oid = ObjectId::new();

        assert_eq!(read_object_id(&doc! { "_id": oid }).unwrap(), Some(oid.to_hex()));
        assert_eq!(read_object_id(&doc! {}).unwrap(), None);
        assert!(read_object_id(&doc! { "_id": "plain" }).is_err());
    }

    #[test]
    fn test_read_f64_accepts_integers() {
        assert_eq!(read_f64(&Bson::Int32(3)).unwrap(), 3.0);
        assert_eq!(read_f64(&Bson::Int64(4)).unwrap(), 4.0);
        assert_eq!(read_f64(&Bson::Double(4.5)).unwrap(), 4.5);
        assert!(read_f64(&Bson::String("5".into())).is_err());
    }
}
