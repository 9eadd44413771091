//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the boundary between the entity layer and a concrete document
//! database. It deals in raw bson documents and collection names; identifier
//! normalization, "exactly one" semantics and entity lifecycle live above it, in
//! [`crate::adapter`] and [`crate::entity`].
//!
//! Backends are the source of truth for time: `insert_one` stamps `Meta.CreationTime`
//! and `update_one_by_id` stamps `Meta.ModificationTime` using the store clock, and
//! both report the value they wrote.
//!
//! Implementations must be `Send + Sync`; every call is a single request with no
//! internal retry.

use std::fmt::Debug;

use async_trait::async_trait;
use bson::{DateTime, Document, oid::ObjectId};
use chrono::{Timelike, Utc};

use crate::{
    error::EntityResult,
    query::{Expr, Query},
};

/// The current time at stored precision, rounded up to the next whole millisecond.
///
/// Backends stamp with this so a stored time is never earlier than a clock reading
/// taken before the write.
pub fn stamp_time() -> DateTime {
    let now = Utc::now();
    let millis = now.timestamp_millis();
    if now.nanosecond() % 1_000_000 == 0 {
        DateTime::from_millis(millis)
    } else {
        DateTime::from_millis(millis + 1)
    }
}

/// Result of a single-document insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The document was written with this id and creation time.
    Inserted { id: ObjectId, create_time: DateTime },
    /// A uniqueness constraint rejected the document.
    Duplicate,
}

/// Result of a replace-by-id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Whether a document with the id existed.
    pub matched: bool,
    /// The modification time written into `Meta.ModificationTime`.
    pub modify_time: DateTime,
}

/// Abstract interface for document storage backends.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns documents of `collection` matching the query, honoring projection,
    /// sort, offset, limit and (where supported) timeout.
    async fn find(&self, collection: &str, query: Query) -> EntityResult<Vec<Document>>;

    /// Writes one document.
    ///
    /// The backend assigns `_id` when the document has none and stamps
    /// `Meta.CreationTime` with its own clock. A duplicate key yields
    /// [`InsertOutcome::Duplicate`] rather than an error.
    async fn insert_one(&self, collection: &str, document: Document) -> EntityResult<InsertOutcome>;

    /// Replaces the document with `id` entirely, stamping `Meta.ModificationTime`.
    ///
    /// `document` must not carry `_id`.
    async fn update_one_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> EntityResult<UpdateOutcome>;

    /// Counts matching documents inside the `offset`/`limit` window.
    async fn count_matching(
        &self,
        collection: &str,
        criterion: Option<Expr>,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<u64>;

    /// Removes every matching document and returns how many were removed.
    async fn remove_matching(&self, collection: &str, criterion: Option<Expr>) -> EntityResult<u64>;

    /// Releases backend resources. The default implementation is a no-op.
    async fn shutdown(&self) -> EntityResult<()> {
        Ok(())
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> EntityResult<Self::Backend>;
}
