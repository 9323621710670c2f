//! Filter evaluation for in-memory documents.
//!
//! This module evaluates query filter documents (the argument of `$match`, and the
//! filters of updates and deletes) against BSON documents, following the query
//! semantics the clients rely on: implicit equality, array element matching,
//! comparison operators, `$in`/`$nin`, `$exists` and the logical operators.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docclient_core::error::{DocumentStoreError, DocumentStoreResult};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64` so that `Int32(10)` equals `Double(10.0)`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Embedded documents compare field by field, in order.
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Types the evaluator does not compare (binary, regex, ...).
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Opaque,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Opaque => 8,
        }
    }

    /// Total order used by `$sort`: values of different types order by type rank.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path.
///
/// Arrays met along the path are traversed element-wise and the values found are
/// collected into an array, so `books.author` on an array of books yields the
/// array of their authors.
pub(crate) fn resolve_path(document: &Document, path: &str) -> Option<Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let value = document.get(head)?;

    match rest {
        None => Some(value.clone()),
        Some(rest) => resolve_in_value(value, rest),
    }
}

fn resolve_in_value(value: &Bson, path: &str) -> Option<Bson> {
    match value {
        Bson::Document(doc) => resolve_path(doc, path),
        Bson::Array(items) => {
            let found = items
                .iter()
                .filter_map(|item| resolve_in_value(item, path))
                .collect::<Vec<_>>();

            if found.is_empty() {
                None
            } else {
                Some(Bson::Array(found))
            }
        }
        _ => None,
    }
}

/// Sets a dotted field path, creating intermediate documents as needed.
///
/// Numeric segments index into arrays; assigning past the end pads the array
/// with nulls. A path that would create a field inside an array or a scalar is
/// an error, as on the server.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    match document.get_mut(head) {
        Some(child) => set_in_value(child, head, rest, value),
        None => {
            let mut child = Document::new();
            set_path(&mut child, rest, value)?;
            document.insert(head, child);
            Ok(())
        }
    }
}

fn set_in_value(target: &mut Bson, parent: &str, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match target {
        Bson::Document(document) => set_path(document, path, value),
        Bson::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let index = head.parse::<usize>().map_err(|_| cannot_create(head, parent))?;

            if items.len() <= index {
                items.resize(index + 1, Bson::Null);
            }

            match rest {
                None => {
                    items[index] = value;
                    Ok(())
                }
                Some(rest) => {
                    if matches!(items[index], Bson::Null) {
                        items[index] = Bson::Document(Document::new());
                    }
                    set_in_value(&mut items[index], head, rest, value)
                }
            }
        }
        _ => Err(cannot_create(path, parent)),
    }
}

/// Removes a dotted field path. Array elements are nulled rather than removed.
pub(crate) fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(child) = document.get_mut(head) {
                unset_in_value(child, rest);
            }
        }
    }
}

fn unset_in_value(target: &mut Bson, path: &str) {
    match target {
        Bson::Document(document) => unset_path(document, path),
        Bson::Array(items) => {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            let Some(item) = head.parse::<usize>().ok().and_then(|index| items.get_mut(index)) else {
                return;
            };

            match rest {
                None => *item = Bson::Null,
                Some(rest) => unset_in_value(item, rest),
            }
        }
        _ => {}
    }
}

fn cannot_create(field: &str, parent: &str) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!("cannot create field {field:?} in element {parent:?}"))
}

/// Returns `true` if `field_value` equals `expected`, or is an array containing it.
pub(crate) fn values_match(field_value: &Bson, expected: &Bson) -> bool {
    let left = Comparable::from(field_value);
    let right = Comparable::from(expected);

    if left == right {
        return true;
    }

    match &left {
        Comparable::Array(items) => items.iter().any(|item| item == &right),
        _ => false,
    }
}

/// Evaluates filter documents against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `filter`.
    ///
    /// An empty filter matches everything.
    pub fn matches(&self, filter: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in filter {
            let satisfied = match key.as_str() {
                "$and" => self.all(condition_list(key, condition)?)?,
                "$or" => self.any(condition_list(key, condition)?)?,
                "$nor" => !self.any(condition_list(key, condition)?)?,
                op if op.starts_with('$') => {
                    return Err(DocumentStoreError::UnsupportedPipeline(format!(
                        "top-level query operator {op}"
                    )));
                }
                field => self.field_matches(field, condition)?,
            };

            if !satisfied {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents matching `filter`, preserving their order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = Document>,
        filter: &Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(&document).matches(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn all(&self, filters: Vec<&Document>) -> DocumentStoreResult<bool> {
        for filter in filters {
            if !self.matches(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, filters: Vec<&Document>) -> DocumentStoreResult<bool> {
        for filter in filters {
            if self.matches(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_matches(&self, field: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        let value = resolve_path(self.document, field);

        match condition {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                for (op, operand) in ops {
                    if !Self::operator_matches(value.as_ref(), op, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            expected => Ok(Self::equals(value.as_ref(), expected)),
        }
    }

    fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
        match value {
            Some(value) => values_match(value, expected),
            // A missing field matches an equality test against null.
            None => matches!(expected, Bson::Null),
        }
    }

    fn operator_matches(value: Option<&Bson>, op: &str, operand: &Bson) -> DocumentStoreResult<bool> {
        Ok(match op {
            "$eq" => Self::equals(value, operand),
            "$ne" => !Self::equals(value, operand),
            "$in" => Self::in_list(value, op, operand)?,
            "$nin" => !Self::in_list(value, op, operand)?,
            "$exists" => value.is_some() == truthy(operand),
            "$gt" | "$gte" | "$lt" | "$lte" => match value {
                Some(value) => Self::compare(value, op, operand),
                None => false,
            },
            other => {
                return Err(DocumentStoreError::UnsupportedPipeline(format!(
                    "query operator {other}"
                )));
            }
        })
    }

    fn in_list(value: Option<&Bson>, op: &str, operand: &Bson) -> DocumentStoreResult<bool> {
        match operand {
            Bson::Array(candidates) => Ok(candidates
                .iter()
                .any(|candidate| Self::equals(value, candidate))),
            _ => Err(DocumentStoreError::InvalidDocument(format!(
                "{op} requires an array"
            ))),
        }
    }

    fn compare(value: &Bson, op: &str, operand: &Bson) -> bool {
        let right = Comparable::from(operand);
        let holds = |left: &Comparable<'_>| match left.partial_cmp(&right) {
            Some(ordering) => match op {
                "$gt" => ordering == Ordering::Greater,
                "$gte" => ordering != Ordering::Less,
                "$lt" => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            },
            None => false,
        };

        match Comparable::from(value) {
            Comparable::Array(items) => items.iter().any(holds),
            left => holds(&left),
        }
    }
}

fn condition_list<'b>(op: &str, condition: &'b Bson) -> DocumentStoreResult<Vec<&'b Document>> {
    match condition {
        Bson::Array(items) => items
            .iter()
            .map(|item| {
                item.as_document().ok_or_else(|| {
                    DocumentStoreError::InvalidDocument(format!("{op} entries must be documents"))
                })
            })
            .collect(),
        _ => Err(DocumentStoreError::InvalidDocument(format!("{op} requires an array"))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}
