use bson::{Document, doc};

use docclient_core::{
    entity::{Entity, read_object_id, with_object_id},
    error::DocumentStoreResult,
    identity::Identified,
};

use super::collections;

/// A book author.
///
/// Stored as `{ _id, firstName, lastName }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub id: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Identified for Author {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Entity for Author {
    fn collection_name() -> &'static str {
        collections::AUTHORS
    }

    fn to_document(&self) -> DocumentStoreResult<Document> {
        Ok(with_object_id(
            self,
            doc! {
                "firstName": &self.first_name,
                "lastName": &self.last_name,
            },
        ))
    }

    fn from_document(document: &Document) -> DocumentStoreResult<Self> {
        Ok(Author {
            id: read_object_id(document)?,
            first_name: document.get_str("firstName")?.to_string(),
            last_name: document.get_str("lastName")?.to_string(),
        })
    }
}
