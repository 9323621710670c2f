//! Aggregation pipeline construction.
//!
//! Every read issued by a [`DatabaseClient`](crate::client::DatabaseClient) is a
//! single aggregation pipeline. Entities contribute the stages that resolve their
//! references (joins, unwinds, groups) and the client appends the final `$match`.
//! [`Stage`] builds the individual stage documents so that entity implementations
//! never spell out operator names by hand.
//!
//! # Example
//!
//! ```ignore
//! use docclient_core::pipeline::{Pipeline, Stage};
//! use bson::doc;
//!
//! let pipeline = Pipeline::new()
//!     .stage(Stage::lookup("authors", "author", "_id", "author"))
//!     .stage(Stage::unwind("author"))
//!     .stage(Stage::match_(doc! { "author.lastName": "King" }))
//!     .build();
//! ```

use bson::{Bson, Document, doc};

use crate::query::{Sort, SortDirection};

/// Builders for individual aggregation stages.
pub struct Stage;

impl Stage {
    /// `{ $match: filter }`
    pub fn match_(filter: Document) -> Document {
        doc! { "$match": filter }
    }

    /// `{ $lookup: { from, localField, foreignField, as } }`
    ///
    /// Attaches every document of `from` whose `foreign_field` equals the value of
    /// `local_field` as an array stored under `as_field`.
    pub fn lookup(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Document {
        doc! {
            "$lookup": {
                "from": from,
                "localField": local_field,
                "foreignField": foreign_field,
                "as": as_field,
            }
        }
    }

    /// `{ $unwind: "$path" }`
    ///
    /// Emits one document per array element. Documents where the field is missing
    /// or an empty array are dropped.
    pub fn unwind(path: &str) -> Document {
        doc! { "$unwind": field_ref(path) }
    }

    /// `{ $group: { _id: key, ...accumulators } }`
    pub fn group(key: impl Into<Bson>, accumulators: Document) -> Document {
        let mut group = doc! { "_id": key.into() };
        for (field, accumulator) in accumulators {
            group.insert(field, accumulator);
        }

        doc! { "$group": group }
    }

    /// `{ $sort: { field: 1 | -1 } }`
    pub fn sort(sort: &Sort) -> Document {
        doc! {
            "$sort": {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            }
        }
    }

    /// `{ $skip: n }`
    pub fn skip(count: usize) -> Document {
        doc! { "$skip": count as i64 }
    }

    /// `{ $limit: n }`
    pub fn limit(count: usize) -> Document {
        doc! { "$limit": count as i64 }
    }
}

/// Accumulator expressions used inside [`Stage::group`].
pub struct Accumulator;

impl Accumulator {
    /// `{ $first: expr }`
    pub fn first(expr: impl Into<Bson>) -> Bson {
        Bson::Document(doc! { "$first": expr.into() })
    }

    /// `{ $push: expr }`
    pub fn push(expr: impl Into<Bson>) -> Bson {
        Bson::Document(doc! { "$push": expr.into() })
    }
}

/// Returns the `$`-prefixed field path expression for `path`.
pub fn field_ref(path: &str) -> String {
    format!("${path}")
}

/// An ordered sequence of aggregation stages.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Document>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Document) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends every stage of `stages` in order.
    pub fn stages(mut self, stages: impl IntoIterator<Item = Document>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn build(self) -> Vec<Document> {
        self.stages
    }
}

impl From<Pipeline> for Vec<Document> {
    fn from(pipeline: Pipeline) -> Self {
        pipeline.build()
    }
}
