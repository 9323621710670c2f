//! Aggregation pipeline execution for the in-memory backend.
//!
//! Supports the stages the clients emit: `$match`, `$lookup` (equality form),
//! `$unwind`, `$group` with `$first`/`$last`/`$push`/`$sum`, `$sort`, `$skip`
//! and `$limit`. Any other stage is reported as
//! [`UnsupportedPipeline`](DocumentStoreError::UnsupportedPipeline).

use std::collections::HashMap;
use bson::{Bson, Document};

use docclient_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::evaluator::{Comparable, DocumentEvaluator, resolve_path, set_path, values_match};

/// Runs pipelines over a snapshot of the store's collections.
pub(crate) struct PipelineExecutor<'a> {
    collections: &'a HashMap<String, Vec<Document>>,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(collections: &'a HashMap<String, Vec<Document>>) -> Self {
        Self { collections }
    }

    /// Runs `pipeline` over the documents of `collection`.
    pub fn run(&self, collection: &str, pipeline: &[Document]) -> DocumentStoreResult<Vec<Document>> {
        let mut documents = self.collection(collection).to_vec();

        for stage in pipeline {
            documents = self.apply(stage, documents)?;
        }

        Ok(documents)
    }

    fn collection(&self, name: &str) -> &'a [Document] {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn apply(&self, stage: &Document, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        let mut entries = stage.iter();
        let (name, spec) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(DocumentStoreError::InvalidDocument(
                    "a pipeline stage must have exactly one field".into(),
                ));
            }
        };

        match name.as_str() {
            "$match" => DocumentEvaluator::filter_documents(documents, stage_document(name, spec)?),
            "$lookup" => self.lookup(documents, stage_document(name, spec)?),
            "$unwind" => unwind(documents, spec),
            "$group" => group(documents, stage_document(name, spec)?),
            "$sort" => sort(documents, stage_document(name, spec)?),
            "$skip" => Ok(documents.into_iter().skip(stage_count(name, spec)?).collect()),
            "$limit" => Ok(documents.into_iter().take(stage_count(name, spec)?).collect()),
            other => Err(DocumentStoreError::UnsupportedPipeline(format!("stage {other}"))),
        }
    }

    fn lookup(&self, documents: Vec<Document>, spec: &Document) -> DocumentStoreResult<Vec<Document>> {
        let from = spec.get_str("from")?;
        let local_field = spec.get_str("localField")?;
        let foreign_field = spec.get_str("foreignField")?;
        let as_field = spec.get_str("as")?;
        let foreign = self.collection(from);

        documents
            .into_iter()
            .map(|mut document| -> DocumentStoreResult<Document> {
                let local = resolve_path(&document, local_field).unwrap_or(Bson::Null);
                let joined = foreign
                    .iter()
                    .filter(|candidate| {
                        let key = resolve_path(candidate, foreign_field).unwrap_or(Bson::Null);
                        join_keys_match(&local, &key)
                    })
                    .cloned()
                    .map(Bson::Document)
                    .collect::<Vec<_>>();

                set_path(&mut document, as_field, Bson::Array(joined))?;
                Ok(document)
            })
            .collect()
    }
}

fn join_keys_match(local: &Bson, foreign: &Bson) -> bool {
    match local {
        Bson::Array(items) => items.iter().any(|item| values_match(foreign, item)),
        local => values_match(foreign, local),
    }
}

fn unwind(documents: Vec<Document>, spec: &Bson) -> DocumentStoreResult<Vec<Document>> {
    let (path, preserve) = match spec {
        Bson::String(path) => (path.as_str(), false),
        Bson::Document(options) => (
            options.get_str("path")?,
            options.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
        ),
        _ => {
            return Err(DocumentStoreError::InvalidDocument(
                "$unwind requires a field path".into(),
            ));
        }
    };
    let path = field_path(path)?;

    let mut unwound = Vec::with_capacity(documents.len());

    for document in documents {
        match resolve_path(&document, path) {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = document.clone();
                    set_path(&mut copy, path, item)?;
                    unwound.push(copy);
                }
            }
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve {
                    unwound.push(document);
                }
            }
            Some(_) => unwound.push(document),
        }
    }

    Ok(unwound)
}

/// Running state of one accumulator within one group.
enum Accumulated {
    First(Option<Bson>),
    Last(Option<Bson>),
    Push(Vec<Bson>),
    Sum(f64, bool),
}

impl Accumulated {
    fn new(operator: &str) -> DocumentStoreResult<Self> {
        match operator {
            "$first" => Ok(Accumulated::First(None)),
            "$last" => Ok(Accumulated::Last(None)),
            "$push" => Ok(Accumulated::Push(Vec::new())),
            "$sum" => Ok(Accumulated::Sum(0.0, true)),
            other => Err(DocumentStoreError::UnsupportedPipeline(format!(
                "group accumulator {other}"
            ))),
        }
    }

    fn add(&mut self, value: Option<Bson>, seen_first: bool) {
        match self {
            Accumulated::First(slot) => {
                if !seen_first {
                    *slot = value;
                }
            }
            Accumulated::Last(slot) => *slot = value,
            Accumulated::Push(items) => {
                if let Some(value) = value {
                    items.push(value);
                }
            }
            Accumulated::Sum(total, integral) => match value {
                Some(Bson::Int32(n)) => *total += f64::from(n),
                Some(Bson::Int64(n)) => *total += n as f64,
                Some(Bson::Double(n)) => {
                    *total += n;
                    *integral = false;
                }
                _ => {}
            },
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulated::First(value) | Accumulated::Last(value) => value.unwrap_or(Bson::Null),
            Accumulated::Push(items) => Bson::Array(items),
            Accumulated::Sum(total, true) => Bson::Int64(total as i64),
            Accumulated::Sum(total, false) => Bson::Double(total),
        }
    }
}

struct Group {
    key: Bson,
    fields: Vec<(String, Accumulated)>,
}

fn group(documents: Vec<Document>, spec: &Document) -> DocumentStoreResult<Vec<Document>> {
    let key_expr = spec.get("_id").ok_or_else(|| {
        DocumentStoreError::InvalidDocument("$group requires an _id expression".into())
    })?;

    let mut accumulators = Vec::new();
    for (field, accumulator) in spec.iter().filter(|(field, _)| field.as_str() != "_id") {
        let accumulator = accumulator
            .as_document()
            .filter(|acc| acc.len() == 1)
            .and_then(|acc| acc.iter().next())
            .ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!(
                    "group field {field} must be a single accumulator"
                ))
            })?;
        accumulators.push((field.clone(), accumulator.0.clone(), accumulator.1.clone()));
    }

    // Groups are emitted in order of first appearance.
    let mut groups: Vec<Group> = Vec::new();

    for document in &documents {
        let key = evaluate(document, key_expr)?.unwrap_or(Bson::Null);
        let position = groups
            .iter()
            .position(|group| Comparable::from(&group.key) == Comparable::from(&key));

        let (group, seen_first) = match position {
            Some(index) => (&mut groups[index], true),
            None => {
                let fields = accumulators
                    .iter()
                    .map(|(field, operator, _)| Ok((field.clone(), Accumulated::new(operator)?)))
                    .collect::<DocumentStoreResult<Vec<_>>>()?;
                groups.push(Group { key, fields });
                let last = groups.len() - 1;
                (&mut groups[last], false)
            }
        };

        for ((_, state), (_, _, expr)) in group.fields.iter_mut().zip(&accumulators) {
            state.add(evaluate(document, expr)?, seen_first);
        }
    }

    Ok(groups
        .into_iter()
        .map(|group| {
            let mut output = Document::new();
            output.insert("_id", group.key);
            for (field, state) in group.fields {
                output.insert(field, state.finish());
            }
            output
        })
        .collect())
}

fn sort(mut documents: Vec<Document>, spec: &Document) -> DocumentStoreResult<Vec<Document>> {
    let keys = spec
        .iter()
        .map(|(field, direction)| match direction {
            Bson::Int32(1) | Bson::Int64(1) => Ok((field.clone(), false)),
            Bson::Int32(-1) | Bson::Int64(-1) => Ok((field.clone(), true)),
            Bson::Double(d) if *d == 1.0 || *d == -1.0 => Ok((field.clone(), *d < 0.0)),
            _ => Err(DocumentStoreError::InvalidDocument(format!(
                "sort direction for {field} must be 1 or -1"
            ))),
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let left = resolve_path(a, field).unwrap_or(Bson::Null);
            let right = resolve_path(b, field).unwrap_or(Bson::Null);
            let ordering = Comparable::from(&left).sort_cmp(&Comparable::from(&right));
            let ordering = if *descending { ordering.reverse() } else { ordering };

            if ordering.is_ne() {
                return ordering;
            }
        }

        std::cmp::Ordering::Equal
    });

    Ok(documents)
}

/// Evaluates an aggregation expression against `document`.
///
/// `"$path"` strings resolve fields, documents evaluate field by field (dropping
/// fields that resolve to nothing) and any other value is a literal.
fn evaluate(document: &Document, expr: &Bson) -> DocumentStoreResult<Option<Bson>> {
    match expr {
        Bson::String(path) if path.starts_with('$') => Ok(resolve_path(document, field_path(path)?)),
        Bson::Document(fields) => {
            if let Some(op) = fields.keys().find(|key| key.starts_with('$')) {
                return Err(DocumentStoreError::UnsupportedPipeline(format!(
                    "expression operator {op}"
                )));
            }

            let mut output = Document::new();
            for (field, value) in fields {
                if let Some(value) = evaluate(document, value)? {
                    output.insert(field.clone(), value);
                }
            }

            Ok(Some(Bson::Document(output)))
        }
        Bson::Array(items) => Ok(Some(Bson::Array(
            items
                .iter()
                .map(|item| Ok(evaluate(document, item)?.unwrap_or(Bson::Null)))
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        ))),
        literal => Ok(Some(literal.clone())),
    }
}

fn field_path(path: &str) -> DocumentStoreResult<&str> {
    path.strip_prefix('$')
        .filter(|path| !path.is_empty())
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("{path:?} is not a field path")))
}

fn stage_document<'b>(name: &str, spec: &'b Bson) -> DocumentStoreResult<&'b Document> {
    spec.as_document()
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("{name} requires a document")))
}

fn stage_count(name: &str, spec: &Bson) -> DocumentStoreResult<usize> {
    match spec {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        _ => Err(DocumentStoreError::InvalidDocument(format!(
            "{name} requires a non-negative integer"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    fn collections(entries: Vec<(&str, Vec<Document>)>) -> HashMap<String, Vec<Document>> {
        entries
            .into_iter()
            .map(|(name, docs)| (name.to_string(), docs))
            .collect()
    }

    #[test]
    fn test_lookup_then_unwind_resolves_reference() {
        let author = ObjectId::new();
        let data = collections(vec![
            ("authors", vec![doc! { "_id": author, "firstName": "Dan" }]),
            ("books", vec![doc! { "_id": ObjectId::new(), "author": author, "prices": [10.0] }]),
        ]);

        let result = PipelineExecutor::new(&data)
            .run(
                "books",
                &[
                    doc! { "$lookup": { "from": "authors", "localField": "author", "foreignField": "_id", "as": "author" } },
                    doc! { "$unwind": "$author" },
                ],
            )
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].get_document("author").unwrap().get_str("firstName").unwrap(),
            "Dan"
        );
    }

    #[test]
    fn test_unwind_drops_missing_and_empty_unless_preserved() {
        let data = collections(vec![(
            "c",
            vec![doc! { "v": [1, 2] }, doc! { "v": [] }, doc! { "w": 1 }, doc! { "v": 3 }],
        )]);
        let executor = PipelineExecutor::new(&data);

        let dropped = executor.run("c", &[doc! { "$unwind": "$v" }]).unwrap();
        assert_eq!(dropped.len(), 3);

        let preserved = executor
            .run("c", &[doc! { "$unwind": { "path": "$v", "preserveNullAndEmptyArrays": true } }])
            .unwrap();
        assert_eq!(preserved.len(), 5);
    }

    #[test]
    fn test_group_keeps_push_order_and_first() {
        let data = collections(vec![(
            "c",
            vec![
                doc! { "k": "a", "name": "first", "n": 1 },
                doc! { "k": "b", "name": "other", "n": 5 },
                doc! { "k": "a", "name": "second", "n": 2 },
            ],
        )]);

        let result = PipelineExecutor::new(&data)
            .run(
                "c",
                &[doc! { "$group": {
                    "_id": "$k",
                    "name": { "$first": "$name" },
                    "ns": { "$push": { "value": "$n", "missing": "$nope" } },
                    "total": { "$sum": "$n" },
                } }],
            )
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].get_str("_id").unwrap(), "a");
        assert_eq!(result[0].get_str("name").unwrap(), "first");
        assert_eq!(
            result[0].get_array("ns").unwrap(),
            &vec![Bson::Document(doc! { "value": 1 }), Bson::Document(doc! { "value": 2 })]
        );
        assert_eq!(result[0].get_i64("total").unwrap(), 3);
        assert_eq!(result[1].get_str("_id").unwrap(), "b");
    }

    #[test]
    fn test_sort_skip_limit() {
        let data = collections(vec![(
            "c",
            vec![doc! { "n": 3 }, doc! { "n": 1 }, doc! { "n": 2 }, doc! {}],
        )]);

        let result = PipelineExecutor::new(&data)
            .run(
                "c",
                &[doc! { "$sort": { "n": -1 } }, doc! { "$skip": 1_i64 }, doc! { "$limit": 2_i64 }],
            )
            .unwrap();

        let ns = result.iter().map(|d| d.get_i32("n").unwrap()).collect::<Vec<_>>();
        assert_eq!(ns, vec![2, 1]);
    }

    #[test]
    fn test_unknown_stage_is_unsupported() {
        let data = collections(vec![]);
        let result = PipelineExecutor::new(&data).run("c", &[doc! { "$facet": {} }]);

        assert!(matches!(result, Err(DocumentStoreError::UnsupportedPipeline(_))));
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let data = collections(vec![]);

        assert!(PipelineExecutor::new(&data).run("nothing", &[]).unwrap().is_empty());
    }
}
