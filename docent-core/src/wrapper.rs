//! The bridge between entities and their collection.
//!
//! A [`CollectionWrapper`] pairs one store collection with the kind name of the
//! entities it holds. Wrappers are shared: the owning [`crate::store::EntityStore`]
//! keeps exactly one per collection name, and every entity loaded from or created for
//! that collection holds an `Arc` to it.

use bson::{Bson, DateTime, Document, oid::ObjectId};

use crate::{
    adapter::StoreCollection,
    document::{EntityDocument, RootSection, meta},
    error::{EntityError, EntityResult},
    id::ID_FIELD,
};

#[derive(Debug)]
pub struct CollectionWrapper {
    collection: StoreCollection,
    entity_name: String,
}

impl CollectionWrapper {
    pub fn new(collection: StoreCollection, entity_name: impl Into<String>) -> Self {
        Self { collection, entity_name: entity_name.into() }
    }

    pub fn collection(&self) -> &StoreCollection {
        &self.collection
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Kind name given to entities of this collection (`Meta.Type`).
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Inserts a detached entity document and returns the identity the store assigned.
    ///
    /// A duplicate-key rejection (a uniqueness constraint on the signature, usually)
    /// surfaces as [`EntityError::DuplicateWrite`].
    pub(crate) async fn add_one_entity(
        &self,
        document: &EntityDocument,
    ) -> EntityResult<(ObjectId, DateTime)> {
        let mut stored = document.to_bson();
        if !self.collection.insert(&mut stored).await? {
            return Err(EntityError::DuplicateWrite(format!(
                "{} entity rejected by a uniqueness constraint of collection {}",
                self.entity_name,
                self.collection_name()
            )));
        }

        let id = match stored.get(ID_FIELD) {
            Some(Bson::ObjectId(id)) => *id,
            _ => return Err(EntityError::invariant("inserted document has no ObjectId")),
        };
        Ok((id, stamped_time(&stored, meta::CREATION_TIME)?))
    }

    /// Replaces the stored document with `id` by the entity document and returns the
    /// modification time the store stamped.
    pub(crate) async fn update_the_only_one_entity(
        &self,
        id: ObjectId,
        document: &EntityDocument,
    ) -> EntityResult<DateTime> {
        let mut stored = document.sections_to_bson();
        if !self.collection.update_by_id(id, &mut stored).await? {
            return Err(EntityError::NotFound(
                format!("{ID_FIELD} {id}"),
                self.collection_name().to_string(),
            ));
        }

        stamped_time(&stored, meta::MODIFICATION_TIME)
    }
}

fn stamped_time(stored: &Document, key: &str) -> EntityResult<DateTime> {
    match stored.get(RootSection::Meta.as_str()) {
        Some(Bson::Document(fields)) => match fields.get(key) {
            Some(Bson::DateTime(time)) => Ok(*time),
            _ => Err(EntityError::invariant(format!("store did not stamp Meta.{key}"))),
        },
        _ => Err(EntityError::invariant(format!("store did not stamp Meta.{key}"))),
    }
}
