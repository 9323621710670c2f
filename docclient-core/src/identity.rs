//! Object identifiers for stored entities.
//!
//! Identifiers are the 24 character hex form of a BSON [`ObjectId`]. They are
//! produced by the database on first insert (or by the client for upserts) and
//! kept on the entity as a plain string.

use bson::oid::ObjectId;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Returns `true` if `id` is the hex form of an [`ObjectId`].
pub fn is_valid_object_id(id: &str) -> bool {
    ObjectId::parse_str(id).is_ok()
}

/// Parses a hex identifier into an [`ObjectId`].
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidIdentifier`] if `id` is not well-formed.
pub fn parse_object_id(id: &str) -> DocumentStoreResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| DocumentStoreError::InvalidIdentifier(id.to_string()))
}

/// Base behaviour of every storable entity: an optional, externally generated identifier.
///
/// # Example
///
/// ```ignore
/// use docclient_core::identity::Identified;
///
/// #[derive(Debug, Clone, Default)]
/// pub struct Tag {
///     pub id: Option<String>,
///     pub label: String,
/// }
///
/// impl Identified for Tag {
///     fn id(&self) -> Option<&str> { self.id.as_deref() }
///     fn set_id(&mut self, id: String) { self.id = Some(id); }
/// }
/// ```
pub trait Identified {
    /// Returns the identifier, or `None` if the entity was never persisted.
    fn id(&self) -> Option<&str>;

    /// Assigns the identifier generated for this entity.
    fn set_id(&mut self, id: String);

    /// Returns `true` if the entity carries a well-formed identifier.
    fn has_valid_object_id(&self) -> bool {
        self.id().is_some_and(is_valid_object_id)
    }

    /// Returns the identifier as an [`ObjectId`] if it is well-formed.
    fn object_id(&self) -> Option<ObjectId> {
        self.id().and_then(|id| ObjectId::parse_str(id).ok())
    }
}

#[cfg(test)]
mod tests {
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
    fn test_missing_identifier_is_invalid() {
        let sample = Sample::default();

        assert!(!sample.has_valid_object_id());
        assert!(sample.object_id().is_none());
    }

    #[test]
    fn test_generated_identifier_is_valid() {
        let mut sample = Sample::default();
        let oid = ObjectId::new();
        sample.set_id(oid.to_hex());

        assert!(sample.has_valid_object_id());
        assert_eq!(sample.object_id(), Some(oid));
    }

    #[test]
    fn test_long_non_hex_identifier_is_invalid() {
        assert!(!is_valid_object_id("zzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(!is_valid_object_id(""));
        assert!(!is_valid_object_id("5f2b"));
        assert!(matches!(
            parse_object_id("not-an-id"),
            Err(DocumentStoreError::InvalidIdentifier(_))
        ));
    }
}
