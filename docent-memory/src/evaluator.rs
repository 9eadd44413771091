//! Query expression evaluation for in-memory document filtering.
//!
//! Field names in expressions are dotted paths (`"Info.Username"`), resolved by
//! descending through embedded documents. Comparison semantics follow the document
//! store closely enough for the entity layer: numbers compare across integer and float
//! types, `Ne`/`NoneOf`/`NotContains` match documents where the field is missing, and
//! `AnyOf` matches when any element of an array field is listed.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document, oid::ObjectId};

use docent_core::{
    error::EntityError,
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            // Other types are not comparable
            _ => Comparable::Null,
        }
    }
}

impl Comparable<'_> {
    /// Rank of the value's type in the cross-type sort order.
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
        }
    }

    /// Total order used for sorting: values of different types order by type rank.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            _ => None,
        }
    }
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Orders two documents by a list of sort keys. Missing fields sort as null.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let a = lookup(left, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);
        let b = lookup(right, &key.field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => a.sort_cmp(&b),
            SortDirection::Desc => b.sort_cmp(&a),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<bool, EntityError> {
        self.visit_expr(expr)
    }

    /// Whether `document` matches `criterion`. No criterion matches everything.
    pub fn matches(document: &'a Document, criterion: Option<&Expr>) -> bool {
        match criterion {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr).unwrap_or(false),
            None => true,
        }
    }
}

fn contains(haystack: &Comparable<'_>, needle: &Comparable<'_>) -> bool {
    match (haystack, needle) {
        (Comparable::Array(items), _) => items.iter().any(|item| item == needle),
        (Comparable::String(left), Comparable::String(right)) => left.contains(right),
        _ => false,
    }
}

fn any_of(field: &Comparable<'_>, listed: &Comparable<'_>) -> bool {
    match (field, listed) {
        (Comparable::Array(items), Comparable::Array(values)) => {
            values.iter().any(|value| items.iter().any(|item| item == value))
        }
        (Comparable::Array(items), single) => items.iter().any(|item| item == single),
        (single, Comparable::Array(values)) => values.iter().any(|value| value == single),
        _ => false,
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = EntityError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            return Ok(matches!(op, FieldOp::Ne | FieldOp::NoneOf | FieldOp::NotContains));
        };
        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right,
            FieldOp::Ne => left != right,
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(left.partial_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(left.partial_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
            FieldOp::Contains => contains(&left, &right),
            FieldOp::NotContains => !contains(&left, &right),
            FieldOp::StartsWith => match (&left, &right) {
                (Comparable::String(l), Comparable::String(r)) => l.starts_with(r),
                _ => false,
            },
            FieldOp::EndsWith => match (&left, &right) {
                (Comparable::String(l), Comparable::String(r)) => l.ends_with(r),
                _ => false,
            },
            FieldOp::AnyOf => any_of(&left, &right),
            FieldOp::NoneOf => !any_of(&left, &right),
        })
    }
}
