//! Query translation from docent criteria to MongoDB filter documents.

use bson::{Bson, Document, doc};

use docent_core::{
    error::EntityError,
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Translates criterion trees into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// The filter for an optional criterion. `None` matches everything.
    pub(crate) fn filter(criterion: Option<&Expr>) -> Result<Document, EntityError> {
        match criterion {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    pub(crate) fn sort(sort: &[Sort]) -> Option<Document> {
        if sort.is_empty() {
            return None;
        }

        Some(
            sort.iter()
                .map(|key| {
                    let direction = match key.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    };
                    (key.field.clone(), Bson::Int32(direction))
                })
                .collect(),
        )
    }

    pub(crate) fn projection(fields: &[String]) -> Document {
        fields
            .iter()
            .map(|field| (field.clone(), Bson::Int32(1)))
            .collect()
    }
}

/// Escapes regular expression metacharacters so `input` matches literally.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if "\\^$.|?*+()[]{}".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn requires(op: &str, kind: &str) -> EntityError {
    EntityError::invariant(format!("{op} operator requires {kind} value"))
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = EntityError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to a single field's operator; `$nor` negates a whole clause.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(s) },
                    Bson::Array(arr) => doc! { "$all": arr },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                    Bson::Array(arr) => doc! { "$nin": arr },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", escape_regex(s)) },
                    _ => return Err(requires("StartsWith", "a string")),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", escape_regex(s)) },
                    _ => return Err(requires("EndsWith", "a string")),
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(arr) => doc! { "$in": arr },
                    other => doc! { "$in": [other] },
                },
                FieldOp::NoneOf => match value {
                    Bson::Array(arr) => doc! { "$nin": arr },
                    other => doc! { "$nin": [other] },
                },
            }
        })
    }
}
