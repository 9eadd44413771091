//! Criterion construction for collection queries.
//!
//! A criterion is an [`Expr`] tree built with the [`Filter`] helpers. Field names are
//! dotted paths into the sectioned document, e.g. `"Info.Username"` or `"Meta.Type"`;
//! the identifier lives at `"_id"`.
//!
//! ```ignore
//! use docent::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("Meta.Type", "User").and(Filter::exists("Signature")))
//!     .sort("Meta.CreationTime", SortDirection::Desc)
//!     .offset(20)
//!     .limit(10)
//!     .build();
//! ```
//!
//! Backends consume the tree through [`QueryVisitor`]: the in-memory backend evaluates
//! it against each stored document, the MongoDB backend translates it to a filter
//! document.

use std::{fmt, time::Duration};

use bson::Bson;

use crate::{document::RootSection, error::EntityError, id::ID_FIELD};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key. Queries apply their keys in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Sort { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Sort { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String or array contains value.
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    /// Field (or any element of an array field) equals one of the listed values.
    AnyOf,
    NoneOf,
}

/// A criterion over stored documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All sub-expressions must match.
    And(Vec<Expr>),
    /// At least one sub-expression must match.
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present (`true`) or absent (`false`).
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Logical AND; a left-hand conjunction is extended in place.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(list) => Expr::And(append(list, other)),
            single => Expr::And(vec![single, other]),
        }
    }

    /// Logical OR; a left-hand disjunction is extended in place.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(list) => Expr::Or(append(list, other)),
            single => Expr::Or(vec![single, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

fn append(mut list: Vec<Expr>, expr: Expr) -> Vec<Expr> {
    list.push(expr);
    list
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, exprs: &[Expr], sep: &str| -> fmt::Result {
            write!(f, "(")?;
            for (index, expr) in exprs.iter().enumerate() {
                if index > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{expr}")?;
            }
            write!(f, ")")
        };

        match self {
            Expr::And(exprs) => join(f, exprs, "and"),
            Expr::Or(exprs) => join(f, exprs, "or"),
            Expr::Not(expr) => write!(f, "not {expr}"),
            Expr::Exists(field, true) => write!(f, "{field} exists"),
            Expr::Exists(field, false) => write!(f, "{field} missing"),
            Expr::Field { field, op, value } => write!(f, "{field} {op:?} {value}"),
        }
    }
}

/// A structured query: criterion, projection, ordering, window and timeout.
///
/// `timeout` only matters for multi-document reads; backends without a server-side
/// time limit ignore it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    /// Dotted field paths to return. `_id` is always returned.
    pub projection: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Vec<Sort>,
    pub timeout: Option<Duration>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// A query matching documents against `criterion`, without windowing.
    pub fn matching(criterion: Option<Expr>) -> Self {
        Query { filter: criterion, ..Query::default() }
    }
}

/// Constructors for criterion leaves.
///
/// ```ignore
/// use docent::query::Filter;
///
/// let expr = Filter::eq("Info.Username", "alice")
///     .and(Filter::ne("Meta.IsDisabled", true));
/// let same = Filter::in_section(RootSection::Info, "Username", "alice");
/// ```
pub struct Filter;

impl Filter {
    fn compare(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), op, value.into())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Lte, value)
    }

    /// Literal prefix match; the value is never interpreted as a pattern.
    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::StartsWith, value)
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::EndsWith, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::Contains, value)
    }

    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::NotContains, value)
    }

    pub fn any_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::AnyOf, values)
    }

    pub fn none_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Self::compare(field, FieldOp::NoneOf, values)
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(Vec::from_iter(exprs))
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(Vec::from_iter(exprs))
    }

    /// Equality on `<section>.<name>`.
    pub fn in_section(section: RootSection, name: &str, value: impl Into<Bson>) -> Expr {
        Self::eq(format!("{section}.{name}"), value)
    }

    /// Equality on the document id. Hex strings are accepted and normalized downstream.
    pub fn id(id: impl Into<Bson>) -> Expr {
        Self::eq(ID_FIELD, id)
    }

    /// Equality on the root `Signature` value.
    pub fn signature(signature: impl Into<Bson>) -> Expr {
        Self::eq(RootSection::Signature.as_str(), signature)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the filter only when one is given.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    pub fn project(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.query.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn maybe_limit(mut self, limit: Option<usize>) -> Self {
        self.query.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn maybe_offset(mut self, offset: Option<usize>) -> Self {
        self.query.offset = offset;
        self
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn sort_by(mut self, sort: impl IntoIterator<Item = Sort>) -> Self {
        self.query.sort.extend(sort);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query.timeout = timeout;
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<EntityError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
