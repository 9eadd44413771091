//! Per-collection access to the document store.
//!
//! [`StoreCollection`] binds a collection name to a backend and layers the semantics the
//! entity layer relies on over the raw [`StoreBackend`] calls:
//!
//! - `_id` operands in every criterion are normalized (see [`crate::id`]);
//! - inserts report a duplicate as `false` and write the store-assigned `_id` and
//!   `Meta.CreationTime` back into the caller's document;
//! - "only one" reads fetch at most two documents so that "none" and "more than one"
//!   are told apart in a single round trip.

use std::sync::Arc;

use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use tracing::{debug, warn};

use crate::{
    backend::{InsertOutcome, StoreBackend},
    document::{RootSection, meta},
    error::{EntityError, EntityResult},
    id::{ID_FIELD, normalize_criterion},
    query::{Expr, Query, Sort},
};

/// A collection of raw documents in a backend.
#[derive(Debug, Clone)]
pub struct StoreCollection {
    name: String,
    backend: Arc<dyn StoreBackend>,
}

impl StoreCollection {
    pub fn new(name: impl Into<String>, backend: Arc<dyn StoreBackend>) -> Self {
        Self { name: name.into(), backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs a query, normalizing ids in its criterion first.
    pub async fn find(&self, mut query: Query) -> EntityResult<Vec<Document>> {
        query.filter = query.filter.map(normalize_criterion);
        debug!(target: "docent::adapter", collection = %self.name, query = ?query, "find");

        self.backend.find(&self.name, query).await
    }

    /// Inserts `document`, returning `false` on a duplicate key.
    ///
    /// On success the persisted `_id` and `Meta.CreationTime` are written back into
    /// `document`.
    pub async fn insert(&self, document: &mut Document) -> EntityResult<bool> {
        match self
            .backend
            .insert_one(&self.name, document.clone())
            .await?
        {
            InsertOutcome::Inserted { id, create_time } => {
                document.insert(ID_FIELD, id);
                stamp_meta(document, meta::CREATION_TIME, create_time);
                debug!(target: "docent::adapter", collection = %self.name, id = %id, "inserted");
                Ok(true)
            }
            InsertOutcome::Duplicate => {
                warn!(target: "docent::adapter", collection = %self.name, "insert rejected as duplicate");
                Ok(false)
            }
        }
    }

    /// Replaces the document with `id` by `document` (which must not carry `_id`).
    ///
    /// Returns `false` when no document has that id. On success the store-assigned
    /// `Meta.ModificationTime` is written back into `document`.
    pub async fn update_by_id(&self, id: ObjectId, document: &mut Document) -> EntityResult<bool> {
        if document.contains_key(ID_FIELD) {
            return Err(EntityError::invariant(
                "replacement document must not carry _id",
            ));
        }

        let outcome = self
            .backend
            .update_one_by_id(&self.name, id, document.clone())
            .await?;
        if outcome.matched {
            stamp_meta(document, meta::MODIFICATION_TIME, outcome.modify_time);
            debug!(target: "docent::adapter", collection = %self.name, id = %id, "replaced");
        }

        Ok(outcome.matched)
    }

    pub async fn count(
        &self,
        criterion: Option<Expr>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<u64> {
        self.backend
            .count_matching(&self.name, criterion.map(normalize_criterion), skip, limit)
            .await
    }

    /// Removes every matching document. `None` removes the whole collection content.
    pub async fn remove(&self, criterion: Option<Expr>) -> EntityResult<u64> {
        let removed = self
            .backend
            .remove_matching(&self.name, criterion.map(normalize_criterion))
            .await?;
        debug!(target: "docent::adapter", collection = %self.name, removed, "removed");

        Ok(removed)
    }

    pub async fn check_existence(&self, criterion: Expr) -> EntityResult<bool> {
        Ok(self.count(Some(criterion), None, Some(1)).await? > 0)
    }

    pub async fn ensure_existence(&self, criterion: Expr) -> EntityResult<()> {
        if self.check_existence(criterion.clone()).await? {
            Ok(())
        } else {
            Err(self.not_found(&criterion))
        }
    }

    pub async fn check_exists_only_once(&self, criterion: Expr) -> EntityResult<bool> {
        Ok(self.count(Some(criterion), None, Some(2)).await? == 1)
    }

    pub async fn ensure_exists_only_once(&self, criterion: Expr) -> EntityResult<()> {
        match self.count(Some(criterion.clone()), None, Some(2)).await? {
            0 => Err(self.not_found(&criterion)),
            1 => Ok(()),
            _ => Err(self.ambiguous(&criterion)),
        }
    }

    /// Returns the single document matching `criterion`.
    ///
    /// Fails with [`EntityError::NotFound`] when nothing matches and with
    /// [`EntityError::AmbiguousResult`] when two or more documents match.
    pub async fn get_the_only_one(
        &self,
        criterion: Expr,
        projection: Option<Vec<String>>,
    ) -> EntityResult<Document> {
        let query = Query {
            filter: Some(criterion.clone()),
            projection,
            limit: Some(2),
            ..Query::default()
        };
        let mut documents = self.find(query).await?;

        match documents.len() {
            0 => Err(self.not_found(&criterion)),
            1 => Ok(documents.remove(0)),
            _ => Err(self.ambiguous(&criterion)),
        }
    }

    /// Returns the first document matching `criterion` under the given order and window.
    pub async fn get_one(
        &self,
        criterion: Expr,
        projection: Option<Vec<String>>,
        sort: Vec<Sort>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<Document> {
        // The window can only shrink the candidate set; one document is enough.
        let limit = limit.map_or(1, |limit| limit.min(1));
        let query = Query {
            filter: Some(criterion.clone()),
            projection,
            limit: Some(limit),
            offset: skip,
            sort,
            timeout: None,
        };

        self.find(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(&criterion))
    }

    /// Returns every document matching the query.
    pub async fn get_multi(&self, query: Query) -> EntityResult<Vec<Document>> {
        self.find(query).await
    }

    fn not_found(&self, criterion: &Expr) -> EntityError {
        EntityError::NotFound(criterion.to_string(), self.name.clone())
    }

    fn ambiguous(&self, criterion: &Expr) -> EntityError {
        EntityError::AmbiguousResult(criterion.to_string(), self.name.clone())
    }
}

fn stamp_meta(document: &mut Document, key: &str, time: DateTime) {
    let section = RootSection::Meta.as_str();
    match document.get_mut(section) {
        Some(Bson::Document(fields)) => {
            fields.insert(key, time);
        }
        _ => {
            document.insert(section, doc! { key: time });
        }
    }
}
