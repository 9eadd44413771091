//! MongoDB storage backend.
//!
//! Ids are generated client-side so the inserted `_id` is known without a round trip.
//! Timestamps are stamped by this backend right before the write request is sent.

use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, CountOptions, FindOptions, IndexOptions},
};
use tracing::{debug, warn};

use docent_core::{
    backend::{InsertOutcome, StoreBackend, StoreBackendBuilder, UpdateOutcome, stamp_time},
    document::{RootSection, meta},
    error::{EntityError, EntityResult},
    id::ID_FIELD,
    query::{Expr, Query},
};

use crate::{config::MongoDbConfig, query::MongoQueryTranslator, sanitizer::KeySanitizer};

const DUPLICATE_KEY: i32 = 11000;

fn unavailable(error: MongoError) -> EntityError {
    EntityError::StoreUnavailable(error.to_string())
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

fn stamp(document: &mut Document, key: &str, time: DateTime) {
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

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    query_timeout: Option<Duration>,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database, query_timeout: None }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    /// Creates a unique index on `field` (a dotted path) of `collection`. Inserts that
    /// collide on it are then reported as duplicates.
    pub async fn create_unique_index(&self, collection: &str, field: &str) -> EntityResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().unique(true).sparse(true).build())
                    .build(),
            )
            .await
            .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, collection: &str, query: Query) -> EntityResult<Vec<Document>> {
        // A zero limit means "no limit" to the server.
        if query.limit == Some(0) {
            return Ok(vec![]);
        }

        let mut options = FindOptions::default();
        options.limit = query.limit.map(|limit| limit as i64);
        options.skip = query.offset.map(|skip| skip as u64);
        options.sort = MongoQueryTranslator::sort(&query.sort);
        options.projection = query.projection.as_deref().map(MongoQueryTranslator::projection);
        options.max_time = query.timeout.or(self.query_timeout);

        let filter = MongoQueryTranslator::filter(query.filter.as_ref())?;
        debug!(target: "docent::mongodb", collection, filter = %filter, "find");

        Ok(self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(unavailable)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(KeySanitizer::restore_document)
            .collect())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> EntityResult<InsertOutcome> {
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

        let mut prepared = doc! { ID_FIELD: id };
        for (key, value) in KeySanitizer::sanitize_document(document) {
            if key != ID_FIELD {
                prepared.insert(key, value);
            }
        }
        stamp(&mut prepared, meta::CREATION_TIME, create_time);

        match self.get_collection(collection).insert_one(prepared).await {
            Ok(_) => Ok(InsertOutcome::Inserted { id, create_time }),
            Err(error) if is_duplicate_key(&error) => {
                warn!(target: "docent::mongodb", collection, "duplicate key on insert");
                Ok(InsertOutcome::Duplicate)
            }
            Err(error) => Err(unavailable(error)),
        }
    }

    async fn update_one_by_id(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> EntityResult<UpdateOutcome> {
        let modify_time = stamp_time();
        let mut replacement = KeySanitizer::sanitize_document(document);
        replacement.remove(ID_FIELD);
        stamp(&mut replacement, meta::MODIFICATION_TIME, modify_time);

        let result = self
            .get_collection(collection)
            .replace_one(doc! { ID_FIELD: id }, replacement)
            .await
            .map_err(|error| {
                if is_duplicate_key(&error) {
                    EntityError::DuplicateWrite(format!(
                        "replacement of {id} violates a unique index of collection {collection}"
                    ))
                } else {
                    unavailable(error)
                }
            })?;

        Ok(UpdateOutcome { matched: result.matched_count > 0, modify_time })
    }

    async fn count_matching(
        &self,
        collection: &str,
        criterion: Option<Expr>,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<u64> {
        if limit == Some(0) {
            return Ok(0);
        }

        let mut options = CountOptions::default();
        options.limit = limit.map(|limit| limit as u64);
        options.skip = offset.map(|skip| skip as u64);

        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(criterion.as_ref())?)
            .with_options(options)
            .await
            .map_err(unavailable)
    }

    async fn remove_matching(&self, collection: &str, criterion: Option<Expr>) -> EntityResult<u64> {
        let result = self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::filter(criterion.as_ref())?)
            .await
            .map_err(unavailable)?;

        Ok(result.deleted_count)
    }

    async fn shutdown(&self) -> EntityResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    query_timeout: Option<Duration>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            query_timeout: None,
        }
    }

    pub fn from_config(config: &MongoDbConfig) -> Self {
        Self::new(&config.dsn, &config.database).query_timeout(config.query_timeout())
    }

    /// Default time limit for multi-document reads that carry none of their own.
    pub fn query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> EntityResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn).await.map_err(unavailable)?;
        let client = Client::with_options(options).map_err(unavailable)?;

        Ok(MongoDbStore {
            client,
            database: self.database,
            query_timeout: self.query_timeout,
        })
    }
}
