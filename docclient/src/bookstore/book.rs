use bson::{Bson, Document, doc};

use docclient_core::{
    entity::{Entity, read_f64, read_object_id, with_object_id},
    error::{DocumentStoreError, DocumentStoreResult},
    identity::Identified,
    pipeline::{Pipeline, Stage},
};

use super::{author::Author, collections};

/// A book with its author and price list.
///
/// Stored as `{ _id, author: <author _id>, prices: [...] }`. Reads join the
/// author back in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub id: Option<String>,
    pub author: Author,
    pub prices: Vec<f64>,
}

impl Book {
    pub fn new(author: Author, prices: Vec<f64>) -> Self {
        Self { id: None, author, prices }
    }
}

impl Identified for Book {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// Reads a `prices` array; a missing field is an empty list.
fn read_prices(document: &Document) -> DocumentStoreResult<Vec<f64>> {
    match document.get("prices") {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(prices)) => prices.iter().map(read_f64).collect(),
        Some(other) => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a price list, found {other}"
        ))),
    }
}

impl Entity for Book {
    fn collection_name() -> &'static str {
        collections::BOOKS
    }

    fn pipeline(filter: Document) -> Vec<Document> {
        Pipeline::new()
            .stage(Stage::lookup(collections::AUTHORS, "author", "_id", "author"))
            .stage(Stage::unwind("author"))
            .stage(Stage::match_(filter))
            .build()
    }

    fn to_document(&self) -> DocumentStoreResult<Document> {
        let author = self.author.object_id().ok_or_else(|| {
            DocumentStoreError::InvalidDocument("book author has not been stored".into())
        })?;

        Ok(with_object_id(
            self,
            doc! {
                "author": author,
                "prices": self.prices.clone(),
            },
        ))
    }

    fn from_document(document: &Document) -> DocumentStoreResult<Self> {
        Ok(Book {
            id: read_object_id(document)?,
            author: Author::from_document(document.get_document("author")?)?,
            prices: read_prices(document)?,
        })
    }
}
