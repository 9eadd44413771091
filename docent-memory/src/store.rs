//! In-memory storage implementation for entity stores.
//!
//! Documents are kept per collection in insertion order behind an async-aware
//! read-write lock. The store behaves like the document database where the entity
//! layer depends on it: it assigns `ObjectId`s, stamps creation and modification times
//! with its own clock, and reports uniqueness violations as duplicates.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docent_core::{
    backend::{InsertOutcome, StoreBackend, StoreBackendBuilder, UpdateOutcome, stamp_time},
    document::{RootSection, meta},
    error::{EntityError, EntityResult},
    id::ID_FIELD,
    query::{Expr, Query},
};

use crate::evaluator::{DocumentEvaluator, compare_documents, lookup};

type CollectionDocs = Vec<Document>;
type StoreMap = HashMap<String, CollectionDocs>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so it can be
/// shared across async tasks. Clones share the same data.
///
/// Queries scan every document of the collection; there are no indexes. Unique fields
/// declared through [`InMemoryStoreBuilder::unique`] are checked on every write.
///
/// # Example
///
/// ```ignore
/// use docent_memory::InMemoryStore;
/// use docent::store::EntityStore;
///
/// let store = EntityStore::new(InMemoryStore::new());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
    /// collection name -> dotted paths whose values must be unique
    unique: Arc<HashMap<String, Vec<String>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store without uniqueness constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Whether `candidate` collides with a document of `documents` on a unique field.
    /// The document with `skip_id` is ignored.
    fn violates_unique(
        &self,
        collection: &str,
        documents: &[Document],
        candidate: &Document,
        skip_id: Option<&ObjectId>,
    ) -> bool {
        let Some(fields) = self.unique.get(collection) else {
            return false;
        };

        fields.iter().any(|field| {
            let Some(value) = lookup(candidate, field) else {
                return false;
            };
            documents
                .iter()
                .filter(|existing| skip_id.is_none_or(|id| existing.get(ID_FIELD) != Some(&Bson::ObjectId(*id))))
                .any(|existing| lookup(existing, field) == Some(value))
        })
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, collection: &str, query: Query) -> EntityResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched = documents
            .iter()
            .filter(|document| DocumentEvaluator::matches(document, query.filter.as_ref()))
            .collect::<Vec<_>>();

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        Ok(matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.projection {
                Some(fields) => project(document, fields),
                None => document.clone(),
            })
            .collect())
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> EntityResult<InsertOutcome> {
        let id = match document.get(ID_FIELD) {
            None => ObjectId::new(),
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(EntityError::invariant(format!(
                    "{ID_FIELD} must be an ObjectId, got {other}"
                )));
            }
        };
        let create_time = stamp_time();

        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();

        let id_taken = documents
            .iter()
            .any(|existing| existing.get(ID_FIELD) == Some(&Bson::ObjectId(id)));
        if id_taken || self.violates_unique(collection, documents, &document, None) {
            debug!(target: "docent::memory", collection, "duplicate insert rejected");
            return Ok(InsertOutcome::Duplicate);
        }

        document.insert(ID_FIELD, id);
        stamp(&mut document, meta::CREATION_TIME, create_time)?;
        documents.push(document);

        Ok(InsertOutcome::Inserted { id, create_time })
    }

    async fn update_one_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> EntityResult<UpdateOutcome> {
        let modify_time = stamp_time();

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(UpdateOutcome { matched: false, modify_time });
        };
        let Some(position) = documents
            .iter()
            .position(|existing| existing.get(ID_FIELD) == Some(&Bson::ObjectId(id)))
        else {
            return Ok(UpdateOutcome { matched: false, modify_time });
        };

        let mut replacement = doc! { ID_FIELD: id };
        for (key, value) in document {
            if key != ID_FIELD {
                replacement.insert(key, value);
            }
        }
        stamp(&mut replacement, meta::MODIFICATION_TIME, modify_time)?;

        if self.violates_unique(collection, documents, &replacement, Some(&id)) {
            return Err(EntityError::DuplicateWrite(format!(
                "replacement of {id} violates a unique field of collection {collection}"
            )));
        }
        documents[position] = replacement;

        Ok(UpdateOutcome { matched: true, modify_time })
    }

    async fn count_matching(
        &self,
        collection: &str,
        criterion: Option<Expr>,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<u64> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(0);
        };

        let count = documents
            .iter()
            .filter(|document| DocumentEvaluator::matches(document, criterion.as_ref()))
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .count();

        Ok(count as u64)
    }

    async fn remove_matching(&self, collection: &str, criterion: Option<Expr>) -> EntityResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|document| !DocumentEvaluator::matches(document, criterion.as_ref()));

        Ok((before - documents.len()) as u64)
    }
}

/// Stamps `Meta.<key>`, creating the section when missing.
fn stamp(document: &mut Document, key: &str, time: DateTime) -> EntityResult<()> {
    let section = RootSection::Meta.as_str();
    match document.get_mut(section) {
        Some(Bson::Document(fields)) => {
            fields.insert(key, time);
        }
        None | Some(Bson::Null) => {
            document.insert(section, doc! { key: time });
        }
        Some(other) => {
            return Err(EntityError::invariant(format!(
                "root field {section} is not a document: {other}"
            )));
        }
    }
    Ok(())
}

/// Keeps `_id` and the listed dotted paths, rebuilding the nesting of each path.
fn project(document: &Document, fields: &[String]) -> Document {
    let mut projected = Document::new();
    if let Some(id) = document.get(ID_FIELD) {
        projected.insert(ID_FIELD, id.clone());
    }

    for field in fields {
        if let Some(value) = lookup(document, field) {
            let segments = field.split('.').collect::<Vec<_>>();
            insert_path(&mut projected, &segments, value.clone());
        }
    }

    projected
}

fn insert_path(target: &mut Document, segments: &[&str], value: Bson) {
    match segments {
        [] => {}
        [leaf] => {
            target.insert(*leaf, value);
        }
        [head, rest @ ..] => {
            let mut inner = match target.remove(*head) {
                Some(Bson::Document(inner)) => inner,
                _ => Document::new(),
            };
            insert_path(&mut inner, rest, value);
            target.insert(*head, inner);
        }
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docent_memory::InMemoryStore;
/// use docent::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .unique("User", "Signature")
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    unique: HashMap<String, Vec<String>>,
}

impl InMemoryStoreBuilder {
    /// Declares a unique field of `collection`, like a unique index would. Documents
    /// without the field never collide.
    pub fn unique(mut self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        let fields = self.unique.entry(collection.into()).or_default();
        let field = field.into();
        if !fields.contains(&field) {
            fields.push(field);
        }
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> EntityResult<Self::Backend> {
        debug!(target: "docent::memory", unique_collections = self.unique.len(), "building in-memory store");

        Ok(InMemoryStore {
            store: Arc::default(),
            unique: Arc::new(self.unique),
        })
    }
}
