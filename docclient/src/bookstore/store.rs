use bson::{Bson, Document, doc};

use docclient_core::{
    entity::{Entity, read_object_id, with_object_id},
    error::{DocumentStoreError, DocumentStoreResult},
    identity::Identified,
    pipeline::{Accumulator, Pipeline, Stage, field_ref},
};

use super::{book::Book, collections};

/// A named shop holding a list of books.
///
/// Stored as `{ _id, name, books: [<book _id>, ...] }`. Reads resolve every book
/// reference, and each book's author, through a two-level join that is regrouped
/// per store.
///
/// A store is only returned by reads when it holds at least one book whose
/// author still exists: the joins drop stores with no resolvable book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookStore {
    pub id: Option<String>,
    pub name: String,
    pub books: Vec<Book>,
}

impl BookStore {
    pub fn new(name: impl Into<String>, books: Vec<Book>) -> Self {
        Self {
            id: None,
            name: name.into(),
            books,
        }
    }
}

impl Identified for BookStore {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Entity for BookStore {
    fn collection_name() -> &'static str {
        collections::BOOK_STORES
    }

    fn pipeline(filter: Document) -> Vec<Document> {
        Pipeline::new()
            .stage(Stage::unwind("books"))
            .stage(Stage::lookup(collections::BOOKS, "books", "_id", "books"))
            .stage(Stage::unwind("books"))
            .stage(Stage::lookup(collections::AUTHORS, "books.author", "_id", "authors"))
            .stage(Stage::unwind("authors"))
            .stage(Stage::group(
                field_ref("_id"),
                doc! {
                    "name": Accumulator::first(field_ref("name")),
                    "books": Accumulator::push(doc! {
                        "_id": field_ref("books._id"),
                        "author": field_ref("authors"),
                        "prices": field_ref("books.prices"),
                    }),
                },
            ))
            .stage(Stage::match_(filter))
            .build()
    }

    fn to_document(&self) -> DocumentStoreResult<Document> {
        let books = self
            .books
            .iter()
            .map(|book| {
                book.object_id().map(Bson::ObjectId).ok_or_else(|| {
                    DocumentStoreError::InvalidDocument(format!(
                        "book store {:?} holds a book that has not been stored",
                        self.name
                    ))
                })
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(with_object_id(
            self,
            doc! {
                "name": &self.name,
                "books": books,
            },
        ))
    }

    fn from_document(document: &Document) -> DocumentStoreResult<Self> {
        let books = match document.get("books") {
            None | Some(Bson::Null) => Vec::new(),
            Some(Bson::Array(books)) => books
                .iter()
                .map(|book| match book {
                    Bson::Document(book) => Book::from_document(book),
                    other => Err(DocumentStoreError::InvalidDocument(format!(
                        "expected a resolved book, found {other}"
                    ))),
                })
                .collect::<DocumentStoreResult<Vec<_>>>()?,
            Some(other) => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "expected a book list, found {other}"
                )));
            }
        };

        Ok(BookStore {
            id: read_object_id(document)?,
            name: document.get_str("name")?.to_string(),
            books,
        })
    }
}

#[cfg(test)]
mod tests {
    use bson::oid::ObjectId;

    use super::*;
    use crate::bookstore::Author;

    #[test]
    fn test_to_document_lists_book_ids() {
        let ids = [ObjectId::new(), ObjectId::new()];
        let books = ids
            .iter()
            .map(|id| Book {
                id: Some(id.to_hex()),
                ..Book::default()
            })
            .collect();

        let document = BookStore::new("Thalia", books).to_document().unwrap();

        assert_eq!(
            document,
            doc! { "name": "Thalia", "books": [ids[0], ids[1]] }
        );
    }

    #[test]
    fn test_to_document_rejects_unsaved_book() {
        let store = BookStore::new("Thalia", vec![Book::new(Author::new("Dan", "Brown"), vec![])]);

        assert!(matches!(store.to_document(), Err(DocumentStoreError::InvalidDocument(_))));
    }

    #[test]
    fn test_pipeline_shape() {
        let pipeline = BookStore::pipeline(doc! { "name": "Thalia" });
        let operators = pipeline
            .iter()
            .map(|stage| stage.keys().next().cloned().unwrap_or_default())
            .collect::<Vec<_>>();

        assert_eq!(
            operators,
            vec!["$unwind", "$lookup", "$unwind", "$lookup", "$unwind", "$group", "$match"]
        );

        let group = pipeline[5].get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$_id");
        assert_eq!(
            group.get_document("books").unwrap(),
            &doc! { "$push": { "_id": "$books._id", "author": "$authors", "prices": "$books.prices" } }
        );
    }

    #[test]
    fn test_from_grouped_document() {
        let store = BookStore::from_document(&doc! {
            "_id": ObjectId::new(),
            "name": "Thalia",
            "books": [{
                "_id": ObjectId::new(),
                "author": { "_id": ObjectId::new(), "firstName": "Stephen", "lastName": "King" },
                "prices": [8.99],
            }],
        })
        .unwrap();

        assert_eq!(store.books.len(), 1);
        assert_eq!(store.books[0].author.last_name, "King");
    }
}
