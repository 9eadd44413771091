//! Lazy multi-entity results.
//!
//! An [`EntityBulk`] describes a set of entities without loading them. Nothing is read
//! from the store until [`EntityBulk::count`], [`EntityBulk::ids`] or
//! [`EntityBulk::fetch`] is awaited, and every call reads afresh.

use std::{
    collections::{HashMap, HashSet},
    fmt, marker::PhantomData, sync::Arc};

use bson::{Bson, oid::ObjectId};

use crate::{
    entity::{Entity, EntityModel},
    error::{EntityError, EntityResult},
    id::ID_FIELD,
    query::{Filter, Query},
    wrapper::CollectionWrapper,
};

#[derive(Debug, Clone)]
enum BulkSource {
    /// Every entity matching a query, in query order.
    Query(Query),
    /// Entities by id, in list order. Ids with no stored entity are skipped.
    Ids(Vec<ObjectId>),
}

pub struct EntityBulk<M> {
    wrapper: Arc<CollectionWrapper>,
    source: BulkSource,
    _model: PhantomData<fn() -> M>,
}

impl<M: EntityModel> EntityBulk<M> {
    pub(crate) fn from_query(wrapper: Arc<CollectionWrapper>, query: Query) -> Self {
        Self { wrapper, source: BulkSource::Query(query), _model: PhantomData }
    }

    pub(crate) fn from_ids(wrapper: Arc<CollectionWrapper>, ids: Vec<ObjectId>) -> Self {
        Self { wrapper, source: BulkSource::Ids(ids), _model: PhantomData }
    }

    pub fn collection_name(&self) -> &str {
        self.wrapper.collection_name()
    }

    /// Number of stored entities in the bulk.
    pub async fn count(&self) -> EntityResult<u64> {
        let collection = self.wrapper.collection();
        match &self.source {
            BulkSource::Query(query) => {
                collection
                    .count(query.filter.clone(), query.offset, query.limit)
                    .await
            }
            BulkSource::Ids(ids) => {
                let stored = self.stored_ids(ids).await?;
                Ok(ids.iter().filter(|id| stored.contains(id)).count() as u64)
            }
        }
    }

    /// Ids of the bulk. An id-list bulk keeps list order and repeats, dropping ids with
    /// no stored entity.
    pub async fn ids(&self) -> EntityResult<Vec<ObjectId>> {
        match &self.source {
            BulkSource::Ids(ids) => {
                let stored = self.stored_ids(ids).await?;
                Ok(ids.iter().copied().filter(|id| stored.contains(id)).collect())
            }
            BulkSource::Query(query) => {
                let mut query = query.clone();
                query.projection = Some(vec![ID_FIELD.to_string()]);

                self.wrapper
                    .collection()
                    .find(query)
                    .await?
                    .into_iter()
                    .map(|document| match document.get(ID_FIELD) {
                        Some(Bson::ObjectId(id)) => Ok(*id),
                        _ => Err(EntityError::invariant("stored document has no ObjectId")),
                    })
                    .collect()
            }
        }
    }

    /// Loads every entity of the bulk.
    pub async fn fetch(&self) -> EntityResult<Vec<M>> {
        match &self.source {
            BulkSource::Query(query) => {
                let documents = self.wrapper.collection().find(query.clone()).await?;
                documents
                    .into_iter()
                    .map(|document| self.hydrate(document))
                    .collect()
            }
            BulkSource::Ids(ids) if ids.is_empty() => Ok(Vec::new()),
            BulkSource::Ids(ids) => {
                let documents = self
                    .wrapper
                    .collection()
                    .find(Query::matching(Some(id_list_criterion(ids))))
                    .await?;

                let mut by_id = HashMap::with_capacity(documents.len());
                for document in documents {
                    if let Some(Bson::ObjectId(id)) = document.get(ID_FIELD) {
                        by_id.insert(*id, document);
                    }
                }

                ids.iter()
                    .filter_map(|id| by_id.get(id).cloned())
                    .map(|document| self.hydrate(document))
                    .collect()
            }
        }
    }

    async fn stored_ids(&self, ids: &[ObjectId]) -> EntityResult<HashSet<ObjectId>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let query = Query::builder()
            .filter(id_list_criterion(ids))
            .project([ID_FIELD])
            .build();

        Ok(self
            .wrapper
            .collection()
            .find(query)
            .await?
            .iter()
            .filter_map(|document| match document.get(ID_FIELD) {
                Some(Bson::ObjectId(id)) => Some(*id),
                _ => None,
            })
            .collect())
    }

    fn hydrate(&self, document: bson::Document) -> EntityResult<M> {
        Entity::hydrate(Arc::clone(&self.wrapper), document).map(M::from)
    }
}

impl<M> fmt::Debug for EntityBulk<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBulk")
            .field("collection", &self.wrapper.collection_name())
            .field("source", &self.source)
            .finish()
    }
}

fn id_list_criterion(ids: &[ObjectId]) -> crate::query::Expr {
    Filter::any_of(ID_FIELD, ids.iter().copied().map(Bson::ObjectId).collect::<Vec<_>>())
}
