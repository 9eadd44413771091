//! Field name sanitization for MongoDB compatibility.
//!
//! MongoDB reserves `.` and `$` in field names and rejects `\0`. Entity sections are
//! free-form, so keys below the root sections are escaped on the way in and restored
//! on the way out. Values are never touched: they are matched by queries verbatim.

use bson::{Bson, Document};

pub(crate) struct KeySanitizer;

impl KeySanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Escapes every key of `document`, recursing into embedded documents and arrays.
    pub(crate) fn sanitize_document(document: Document) -> Document {
        document
            .into_iter()
            .map(|(key, value)| (Self::sanitize_key(&key), Self::sanitize_value(value)))
            .collect()
    }

    /// Inverse of [`KeySanitizer::sanitize_document`].
    pub(crate) fn restore_document(document: Document) -> Document {
        document
            .into_iter()
            .map(|(key, value)| (Self::restore_key(&key), Self::restore_value(value)))
            .collect()
    }

    fn sanitize_value(value: Bson) -> Bson {
        match value {
            Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
            Bson::Array(arr) => Bson::Array(arr.into_iter().map(Self::sanitize_value).collect()),
            other => other,
        }
    }

    fn restore_value(value: Bson) -> Bson {
        match value {
            Bson::Document(doc) => Bson::Document(Self::restore_document(doc)),
            Bson::Array(arr) => Bson::Array(arr.into_iter().map(Self::restore_value).collect()),
            other => other,
        }
    }

    fn sanitize_key(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    fn restore_key(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}
