//! Error types and result types for entity and collection operations.
//!
//! Use [`EntityResult<T>`] as the return type for fallible operations.
//!
//! The variants fall into three groups:
//!
//! - **Programmer errors** ([`EntityError::InvariantViolation`], [`EntityError::AccessDenied`]):
//!   structural misuse such as an unknown root section or an empty field name.
//!   These are never expected in a correct program; see [`EntityError::is_fatal`].
//! - **Business conditions** (not found, ambiguous, duplicate signature, reference
//!   conflict, lifecycle violations): the caller is expected to branch on them.
//! - **External failures** ([`EntityError::StoreUnavailable`]): the document store
//!   could not serve the request.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents every condition an entity, collection or store operation can report.
#[derive(Error, Debug)]
pub enum EntityError {
    /// A structural contract was broken by the calling code.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    /// A visibility-guarded method was invoked from a context that may not call it.
    /// The first argument is the method name, the second the declaring class.
    #[error("Access denied to method {0} of class {1}")]
    AccessDenied(String, String),
    /// The collection accessor was never bound to a collection name.
    #[error("Collection {0} has not been initialized")]
    UninitializedCollection(String),
    /// No document matched the given criterion in the collection.
    /// The first argument describes the criterion, the second is the collection name.
    #[error("No document matching {0} in collection {1}")]
    NotFound(String, String),
    /// More than one document matched a criterion expected to be unique.
    /// The first argument describes the criterion, the second is the collection name.
    #[error("More than one document matching {0} in collection {1}")]
    AmbiguousResult(String, String),
    /// A named field is absent from a root section.
    /// The first argument is the field name, the second is the root section.
    #[error("Field {0} does not exist in root section {1}")]
    FieldNotFound(String, String),
    /// A write-once value was written a second time.
    #[error("Duplicate write: {0}")]
    DuplicateWrite(String),
    /// A single-valued reference already holds a different id.
    /// Arguments are the reference name, the existing value and the requested value.
    #[error("Cannot build reference {0} as {2}, old value is {1}")]
    ReferenceConflict(String, String, String),
    /// The entity already has a persisted identifier.
    #[error("Entity {0} is already in the collection")]
    AlreadyPersisted(String),
    /// The entity has not been persisted yet.
    #[error("Entity {0} is not in the collection")]
    NotPersisted(String),
    /// The entity was latched read-only.
    #[error("Entity {0} is read-only")]
    ReadOnly(String),
    /// The underlying document store failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EntityError {
    /// Returns `true` for programmer errors that calling code should not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EntityError::InvariantViolation(_) | EntityError::AccessDenied(_, _)
        )
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        EntityError::InvariantViolation(message.into())
    }
}

/// A specialized `Result` type for entity operations.
pub type EntityResult<T> = Result<T, EntityError>;

impl From<BsonError> for EntityError {
    fn from(err: BsonError) -> Self {
        EntityError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for EntityError {
    fn from(err: SerdeJsonError) -> Self {
        EntityError::Serialization(err.to_string())
    }
}
