//! Store identifier handling.
//!
//! Documents are identified by a bson [`ObjectId`] kept under [`ID_FIELD`]. Callers
//! often hold ids as 24-hex strings (from a URL, a form, a JSON body), so every criterion
//! passing through the adapter has its `_id` operands normalized: strings that parse
//! as an `ObjectId` are converted, anything else is kept as the literal. A malformed id
//! therefore never errors, it simply matches nothing.

use bson::{Bson, oid::ObjectId};

use crate::query::Expr;

/// Name of the identifier field in stored documents.
pub const ID_FIELD: &str = "_id";

/// Converts a string id into an [`ObjectId`], keeping the raw value when it does not parse.
pub fn normalize_id(value: Bson) -> Bson {
    match value {
        Bson::String(raw) => match ObjectId::parse_str(&raw) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(raw),
        },
        Bson::Array(values) => Bson::Array(values.into_iter().map(normalize_id).collect()),
        other => other,
    }
}

/// Rewrites every `_id` operand of a criterion with [`normalize_id`].
pub fn normalize_criterion(expr: Expr) -> Expr {
    match expr {
        Expr::And(exprs) => Expr::And(exprs.into_iter().map(normalize_criterion).collect()),
        Expr::Or(exprs) => Expr::Or(exprs.into_iter().map(normalize_criterion).collect()),
        Expr::Not(inner) => Expr::Not(Box::new(normalize_criterion(*inner))),
        Expr::Field { field, op, value } if field == ID_FIELD => Expr::Field {
            field,
            op,
            value: normalize_id(value),
        },
        other => other,
    }
}

/// Renders an id the way it is exchanged outside the store.
pub fn id_to_string(id: &ObjectId) -> String {
    id.to_hex()
}
