//! The sectioned document model.
//!
//! Every stored entity document is split into five fixed root sections, named by
//! [`RootSection`]:
//!
//! | Section     | Holds                                                        |
//! |-------------|--------------------------------------------------------------|
//! | `Data`      | primary payload fields                                       |
//! | `Info`      | descriptive/display fields                                   |
//! | `Signature` | a write-once uniqueness key (any bson value)                 |
//! | `Reference` | ids (or ordered id lists) of other entities                  |
//! | `Meta`      | bookkeeping: `CreationTime`, `ModificationTime`, `Type`, ... |
//!
//! Stored form:
//!
//! ```text
//! { _id: ObjectId, Data: {..}, Info: {..}, Signature: <any>, Reference: {..}, Meta: {..} }
//! ```
//!
//! No other root name is accepted, neither when addressing a section by name nor when
//! hydrating a stored document.

use std::{fmt, str::FromStr};

use bson::{Bson, Document, oid::ObjectId};
use serde_json::Value;

use crate::{
    error::{EntityError, EntityResult},
    id::ID_FIELD,
};

/// Keys of the `Meta` section maintained by the library.
pub mod meta {
    /// Set by the store when the document is inserted.
    pub const CREATION_TIME: &str = "CreationTime";
    /// Set by the store on every full-document update.
    pub const MODIFICATION_TIME: &str = "ModificationTime";
    /// The entity kind name, written when a detached entity is created.
    pub const TYPE: &str = "Type";
    pub const STATE: &str = "State";
    pub const IS_DISABLED: &str = "IsDisabled";

    /// Keys that only persistence operations may write.
    pub const STORE_MANAGED: [&str; 2] = [CREATION_TIME, MODIFICATION_TIME];
}

/// The closed set of root sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootSection {
    Data,
    Info,
    Signature,
    Reference,
    Meta,
}

impl RootSection {
    pub const ALL: [RootSection; 5] = [
        RootSection::Data,
        RootSection::Info,
        RootSection::Signature,
        RootSection::Reference,
        RootSection::Meta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RootSection::Data => "Data",
            RootSection::Info => "Info",
            RootSection::Signature => "Signature",
            RootSection::Reference => "Reference",
            RootSection::Meta => "Meta",
        }
    }

    /// `Signature` is the only section that is not a keyed sub-mapping.
    pub fn is_keyed(&self) -> bool {
        !matches!(self, RootSection::Signature)
    }
}

impl fmt::Display for RootSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RootSection {
    type Err = EntityError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        RootSection::ALL
            .into_iter()
            .find(|section| section.as_str() == name)
            .ok_or_else(|| EntityError::invariant(format!("invalid root field name: {name}")))
    }
}

/// In-memory form of one stored entity document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDocument {
    id: Option<ObjectId>,
    data: Document,
    info: Document,
    signature: Option<Bson>,
    reference: Document,
    meta: Document,
}

impl EntityDocument {
    /// The document of a freshly created entity: empty sections and `Meta.Type`.
    pub fn detached(entity_name: &str) -> Self {
        let mut meta = Document::new();
        meta.insert(meta::TYPE, entity_name);

        EntityDocument { meta, ..EntityDocument::default() }
    }

    /// Splits a stored document into its sections.
    ///
    /// Missing sections are read as empty. A root key outside the five sections (and
    /// `_id`), a keyed section that is not a sub-document, or an `_id` that is not an
    /// `ObjectId` is rejected as an invariant violation.
    pub fn from_bson(document: Document) -> EntityResult<Self> {
        let mut parsed = EntityDocument::default();

        for (key, value) in document {
            if key == ID_FIELD {
                match value {
                    Bson::ObjectId(oid) => parsed.id = Some(oid),
                    other => {
                        return Err(EntityError::invariant(format!(
                            "{ID_FIELD} is not an ObjectId: {other}"
                        )));
                    }
                }
                continue;
            }

            match key.parse::<RootSection>()? {
                RootSection::Signature => parsed.signature = non_null(value),
                section => match value {
                    Bson::Document(fields) => *parsed.keyed_mut(section)? = fields,
                    Bson::Null => {}
                    other => {
                        return Err(EntityError::invariant(format!(
                            "root field {section} is not a document: {other}"
                        )));
                    }
                },
            }
        }

        Ok(parsed)
    }

    /// The stored form, `_id` included when present.
    pub fn to_bson(&self) -> Document {
        let mut document = Document::new();
        if let Some(id) = &self.id {
            document.insert(ID_FIELD, *id);
        }
        for (key, value) in self.sections_to_bson() {
            document.insert(key, value);
        }
        document
    }

    /// The stored form without `_id`, as sent for a replace-by-id.
    pub fn sections_to_bson(&self) -> Document {
        let mut document = Document::new();
        document.insert(RootSection::Data.as_str(), self.data.clone());
        document.insert(RootSection::Info.as_str(), self.info.clone());
        if let Some(signature) = &self.signature {
            document.insert(RootSection::Signature.as_str(), signature.clone());
        }
        document.insert(RootSection::Reference.as_str(), self.reference.clone());
        document.insert(RootSection::Meta.as_str(), self.meta.clone());
        document
    }

    pub fn to_json(&self) -> EntityResult<Value> {
        Ok(serde_json::to_value(self.to_bson())?)
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    pub(crate) fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }

    pub fn signature(&self) -> Option<&Bson> {
        self.signature.as_ref()
    }

    /// A null signature counts as unset.
    pub(crate) fn set_signature(&mut self, signature: Bson) {
        self.signature = non_null(signature);
    }

    /// Borrows a keyed section. Fails for `Signature`, which is a single value.
    pub fn keyed(&self, section: RootSection) -> EntityResult<&Document> {
        match section {
            RootSection::Data => Ok(&self.data),
            RootSection::Info => Ok(&self.info),
            RootSection::Reference => Ok(&self.reference),
            RootSection::Meta => Ok(&self.meta),
            RootSection::Signature => Err(not_keyed()),
        }
    }

    pub(crate) fn keyed_mut(&mut self, section: RootSection) -> EntityResult<&mut Document> {
        match section {
            RootSection::Data => Ok(&mut self.data),
            RootSection::Info => Ok(&mut self.info),
            RootSection::Reference => Ok(&mut self.reference),
            RootSection::Meta => Ok(&mut self.meta),
            RootSection::Signature => Err(not_keyed()),
        }
    }

    pub fn data(&self) -> &Document {
        &self.data
    }

    pub fn info(&self) -> &Document {
        &self.info
    }

    pub fn reference(&self) -> &Document {
        &self.reference
    }

    pub fn meta(&self) -> &Document {
        &self.meta
    }
}

fn not_keyed() -> EntityError {
    EntityError::invariant("root field Signature has no named fields")
}

fn non_null(value: Bson) -> Option<Bson> {
    match value {
        Bson::Null => None,
        value => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn root_section_names_round_trip() {
        for section in RootSection::ALL {
            assert_eq!(section.as_str().parse::<RootSection>().unwrap(), section);
        }
    }

    #[test]
    fn unknown_root_section_is_an_invariant_violation() {
        let err = "Content".parse::<RootSection>().unwrap_err();

        assert!(matches!(err, EntityError::InvariantViolation(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn detached_document_carries_only_the_type() {
        let document = EntityDocument::detached("User");

        assert!(document.id().is_none());
        assert!(document.signature().is_none());
        assert!(document.data().is_empty());
        assert_eq!(document.meta(), &doc! { "Type": "User" });
    }

    #[test]
    fn stored_document_is_split_into_sections() {
        let id = ObjectId::new();
        let document = EntityDocument::from_bson(doc! {
            "_id": id,
            "Info": { "Username": "alice" },
            "Signature": "alice@example.com",
            "Meta": { "Type": "User" },
        })
        .unwrap();

        assert_eq!(document.id(), Some(&id));
        assert_eq!(document.info(), &doc! { "Username": "alice" });
        assert!(document.data().is_empty());
        assert_eq!(
            document.signature(),
            Some(&Bson::String("alice@example.com".into()))
        );

        let stored = document.to_bson();
        assert_eq!(stored.get(ID_FIELD), Some(&Bson::ObjectId(id)));
        assert_eq!(stored.get("Data"), Some(&Bson::Document(Document::new())));
    }

    #[test]
    fn hydration_rejects_foreign_roots_and_bad_ids() {
        assert!(matches!(
            EntityDocument::from_bson(doc! { "Content": {} }),
            Err(EntityError::InvariantViolation(_))
        ));
        assert!(matches!(
            EntityDocument::from_bson(doc! { "_id": "abc" }),
            Err(EntityError::InvariantViolation(_))
        ));
        assert!(matches!(
            EntityDocument::from_bson(doc! { "Data": 3 }),
            Err(EntityError::InvariantViolation(_))
        ));
    }

    #[test]
    fn stored_null_signature_reads_as_unset() {
        let document = EntityDocument::from_bson(doc! {
            "_id": ObjectId::new(),
            "Signature": Bson::Null,
            "Meta": { "Type": "User" },
        })
        .unwrap();

        assert!(document.signature().is_none());
    }

    #[test]
    fn signature_has_no_keyed_access() {
        let document = EntityDocument::detached("User");

        assert!(document.keyed(RootSection::Signature).is_err());
        assert!(document.keyed(RootSection::Reference).is_ok());
    }
}
