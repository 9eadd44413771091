//! Entities: sectioned documents bound to a collection.
//!
//! An [`Entity`] is either *detached* (created in memory, no id yet) or *persisted*
//! (it has an id in its collection). Persisted entities are additionally *clean* or
//! *dirty* depending on whether they were mutated since the last write.
//!
//! ```text
//!   create_entity()            add_to_collection()
//!  ─────────────────► detached ───────────────────► persisted, clean
//!                                                     │        ▲
//!                                        set_*()      │        │ update_to_collection()
//!                                                     ▼        │
//!                                                   persisted, dirty
//! ```
//!
//! Every mutator first checks the read-only latch ([`Entity::set_read_only`]), which
//! can never be released. Deleting is a collection-level operation, there is no
//! per-entity delete.
//!
//! Concrete models wrap an `Entity` and implement [`EntityModel`] to tell the
//! collection layer their kind and collection names.

use std::sync::Arc;

use bson::{Bson, DateTime, Document, oid::ObjectId};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::{
    bulk::EntityBulk,
    collection::Collection,
    document::{EntityDocument, RootSection, meta},
    error::{EntityError, EntityResult},
    id::id_to_string,
    wrapper::CollectionWrapper,
};

/// A concrete entity type.
///
/// ```ignore
/// pub struct Article(Entity);
///
/// impl EntityModel for Article {
///     const ENTITY_NAME: &'static str = "Article";
///     const COLLECTION_NAME: Option<&'static str> = Some("Article");
/// }
/// ```
pub trait EntityModel: From<Entity> + AsRef<Entity> + AsMut<Entity> + Send + Sync + 'static {
    /// Kind name, written into `Meta.Type` and used to derive reference names.
    const ENTITY_NAME: &'static str;
    /// Collection holding entities of this kind. `None` leaves the collection
    /// uninitialized: every collection operation fails.
    const COLLECTION_NAME: Option<&'static str>;
}

/// A sectioned document together with its lifecycle state.
#[derive(Debug, Clone)]
pub struct Entity {
    wrapper: Arc<CollectionWrapper>,
    document: EntityDocument,
    is_in_collection: bool,
    is_same_as_collection: bool,
    is_read_only: bool,
}

impl Entity {
    /// A new entity that exists only in memory.
    pub(crate) fn detached(wrapper: Arc<CollectionWrapper>) -> Self {
        let document = EntityDocument::detached(wrapper.entity_name());
        Self {
            wrapper,
            document,
            is_in_collection: false,
            is_same_as_collection: false,
            is_read_only: false,
        }
    }

    /// An entity loaded from its collection. The stored document must carry an id.
    pub(crate) fn hydrate(wrapper: Arc<CollectionWrapper>, stored: Document) -> EntityResult<Self> {
        let document = EntityDocument::from_bson(stored)?;
        if document.id().is_none() {
            return Err(EntityError::invariant(format!(
                "document loaded from collection {} has no id",
                wrapper.collection_name()
            )));
        }

        Ok(Self {
            wrapper,
            document,
            is_in_collection: true,
            is_same_as_collection: true,
            is_read_only: false,
        })
    }

    /// Kind name of this entity.
    pub fn entity_name(&self) -> &str {
        self.wrapper.entity_name()
    }

    pub fn collection_name(&self) -> &str {
        self.wrapper.collection_name()
    }

    /// Whether the entity has been persisted.
    pub fn check_is_in_collection(&self) -> bool {
        self.is_in_collection
    }

    /// Whether the in-memory document matches the last persisted state.
    pub fn check_is_same_as_collection(&self) -> bool {
        self.is_same_as_collection
    }

    /// Latches the entity read-only. There is no way back.
    pub fn set_read_only(&mut self) -> &mut Self {
        self.is_read_only = true;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    pub fn ensure_not_read_only(&self) -> EntityResult<()> {
        if self.is_read_only {
            Err(EntityError::ReadOnly(self.describe()))
        } else {
            Ok(())
        }
    }

    pub fn document(&self) -> &EntityDocument {
        &self.document
    }

    pub fn to_json(&self) -> EntityResult<Value> {
        self.document.to_json()
    }

    /// The persisted id. Fails with [`EntityError::NotPersisted`] on a detached entity.
    pub fn get_id(&self) -> EntityResult<ObjectId> {
        self.document
            .id()
            .copied()
            .ok_or_else(|| EntityError::NotPersisted(self.describe()))
    }

    pub fn get_id_string(&self) -> EntityResult<String> {
        self.get_id().map(|id| id_to_string(&id))
    }

    /// When the store accepted the entity.
    pub fn creation_time(&self) -> EntityResult<chrono::DateTime<Utc>> {
        if !self.is_in_collection {
            return Err(EntityError::NotPersisted(self.describe()));
        }
        self.meta_time(meta::CREATION_TIME)?
            .ok_or_else(|| field_not_found(meta::CREATION_TIME, RootSection::Meta))
    }

    /// When the entity was last written by an update, if ever.
    pub fn modification_time(&self) -> EntityResult<Option<chrono::DateTime<Utc>>> {
        self.meta_time(meta::MODIFICATION_TIME)
    }

    // Data

    pub fn data(&self) -> &Document {
        self.document.data()
    }

    /// Fails with [`EntityError::FieldNotFound`] when the field is absent.
    pub fn get_data(&self, name: &str) -> EntityResult<&Bson> {
        self.get_field(RootSection::Data, name)
    }

    pub fn get_data_or(&self, name: &str, default: impl Into<Bson>) -> EntityResult<Bson> {
        self.get_field_or(RootSection::Data, name, default.into())
    }

    pub fn set_data(&mut self, name: &str, value: impl Into<Bson>) -> EntityResult<&mut Self> {
        self.set_field(RootSection::Data, name, value.into())
    }

    pub fn replace_data(&mut self, data: Document) -> EntityResult<&mut Self> {
        self.replace_section(RootSection::Data, data)
    }

    // Info

    pub fn info(&self) -> &Document {
        self.document.info()
    }

    pub fn get_info(&self, name: &str) -> EntityResult<&Bson> {
        self.get_field(RootSection::Info, name)
    }

    pub fn get_info_or(&self, name: &str, default: impl Into<Bson>) -> EntityResult<Bson> {
        self.get_field_or(RootSection::Info, name, default.into())
    }

    pub fn set_info(&mut self, name: &str, value: impl Into<Bson>) -> EntityResult<&mut Self> {
        self.set_field(RootSection::Info, name, value.into())
    }

    pub fn replace_info(&mut self, info: Document) -> EntityResult<&mut Self> {
        self.replace_section(RootSection::Info, info)
    }

    // Meta

    pub fn meta(&self) -> &Document {
        self.document.meta()
    }

    pub fn get_meta(&self, name: &str) -> EntityResult<&Bson> {
        self.get_field(RootSection::Meta, name)
    }

    pub fn get_meta_or(&self, name: &str, default: impl Into<Bson>) -> EntityResult<Bson> {
        self.get_field_or(RootSection::Meta, name, default.into())
    }

    /// Sets a `Meta` field. The store-managed timestamps cannot be written this way.
    pub fn set_meta(&mut self, name: &str, value: impl Into<Bson>) -> EntityResult<&mut Self> {
        if meta::STORE_MANAGED.contains(&name) {
            return Err(EntityError::invariant(format!(
                "Meta.{name} is maintained by the store"
            )));
        }
        self.set_field(RootSection::Meta, name, value.into())
    }

    /// Replaces the `Meta` section, carrying the store-managed timestamps over from the
    /// current one. Timestamps present in `replacement` are ignored.
    pub fn replace_meta(&mut self, mut replacement: Document) -> EntityResult<&mut Self> {
        for key in meta::STORE_MANAGED {
            replacement.remove(key);
            if let Some(time) = self.document.meta().get(key) {
                replacement.insert(key, time.clone());
            }
        }
        self.replace_section(RootSection::Meta, replacement)
    }

    // Reference

    pub fn reference(&self) -> &Document {
        self.document.reference()
    }

    pub fn has_reference(&self, name: &str) -> bool {
        self.document.reference().contains_key(name)
    }

    pub fn get_reference(&self, name: &str) -> EntityResult<&Bson> {
        self.get_field(RootSection::Reference, name)
    }

    pub fn get_reference_or(&self, name: &str, default: impl Into<Bson>) -> EntityResult<Bson> {
        self.get_field_or(RootSection::Reference, name, default.into())
    }

    /// Raw reference write for models that maintain references themselves.
    pub fn set_reference(&mut self, name: &str, value: impl Into<Bson>) -> EntityResult<&mut Self> {
        self.set_field(RootSection::Reference, name, value.into())
    }

    /// Stores `target`'s id under `ref_name`, or `<target kind>Id` when no name is given.
    ///
    /// With `ensure_absent`, a different id already stored under that name is a
    /// [`EntityError::ReferenceConflict`]; storing the same id again is allowed.
    pub fn build_one_reference(
        &mut self,
        target: &Entity,
        ref_name: Option<&str>,
        ensure_absent: bool,
    ) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        let target_id = target.get_id()?;
        let name = ref_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}Id", target.entity_name()));
        ensure_field_name(&name)?;

        if ensure_absent {
            match self.document.reference().get(&name) {
                Some(Bson::ObjectId(existing)) if *existing == target_id => {}
                Some(existing) => {
                    return Err(EntityError::ReferenceConflict(
                        name,
                        existing.to_string(),
                        id_to_string(&target_id),
                    ));
                }
                None => {}
            }
        }

        self.set_field(RootSection::Reference, &name, Bson::ObjectId(target_id))
    }

    /// Appends `target`'s id to the list under `ref_name`, or `<target kind>IdList`.
    ///
    /// With `check_duplicate`, an id already in the list leaves the entity untouched.
    pub fn build_multi_reference(
        &mut self,
        target: &Entity,
        ref_name: Option<&str>,
        check_duplicate: bool,
    ) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        let target_id = Bson::ObjectId(target.get_id()?);
        let name = ref_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}IdList", target.entity_name()));
        ensure_field_name(&name)?;

        let mut ids = match self.document.reference().get(&name) {
            None => Vec::new(),
            Some(Bson::Array(ids)) => ids.clone(),
            Some(other) => {
                return Err(EntityError::invariant(format!(
                    "Reference.{name} is not an id list: {other}"
                )));
            }
        };
        if check_duplicate && ids.contains(&target_id) {
            return Ok(self);
        }
        ids.push(target_id);

        self.set_field(RootSection::Reference, &name, Bson::Array(ids))
    }

    /// A lazy handle over the entities of `collection` whose ids are in `ids`, in list
    /// order, truncated to `limit`.
    pub fn get_bulk_by_id_list<M: EntityModel>(
        ids: Vec<ObjectId>,
        collection: &Collection<M>,
        limit: Option<usize>,
    ) -> EntityResult<EntityBulk<M>> {
        let mut ids = ids;
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        collection.bulk_by_ids(ids)
    }

    /// [`Entity::get_bulk_by_id_list`] over the id list stored in `Reference.<name>`.
    pub fn get_bulk_by_multi_reference<M: EntityModel>(
        &self,
        name: &str,
        collection: &Collection<M>,
        limit: Option<usize>,
    ) -> EntityResult<EntityBulk<M>> {
        let ids = match self.get_reference(name)? {
            Bson::Array(values) => values
                .iter()
                .map(|value| match value {
                    Bson::ObjectId(id) => Ok(*id),
                    other => Err(EntityError::invariant(format!(
                        "Reference.{name} holds a non-id value: {other}"
                    ))),
                })
                .collect::<EntityResult<Vec<_>>>()?,
            other => {
                return Err(EntityError::invariant(format!(
                    "Reference.{name} is not an id list: {other}"
                )));
            }
        };

        Self::get_bulk_by_id_list(ids, collection, limit)
    }

    // Signature

    /// Writes the signature. It can be written exactly once.
    pub fn set_signature(&mut self, signature: impl Into<Bson>) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        if self.document.signature().is_some() {
            return Err(EntityError::DuplicateWrite(format!(
                "signature of {} is already set",
                self.describe()
            )));
        }
        self.document.set_signature(signature.into());
        self.mark_dirty();
        Ok(self)
    }

    pub fn get_signature(&self) -> Option<&Bson> {
        self.document.signature()
    }

    // Conveniences over well-known fields

    pub fn get_name(&self) -> EntityResult<&str> {
        self.get_str(RootSection::Info, "Name")
    }

    pub fn set_name(&mut self, name: &str) -> EntityResult<&mut Self> {
        self.set_info("Name", name)
    }

    pub fn get_state(&self) -> EntityResult<&Bson> {
        self.get_meta(meta::STATE)
    }

    pub fn set_state(&mut self, state: impl Into<Bson>) -> EntityResult<&mut Self> {
        self.set_meta(meta::STATE, state)
    }

    pub fn get_type(&self) -> EntityResult<&str> {
        self.get_str(RootSection::Meta, meta::TYPE)
    }

    /// `Meta.IsDisabled`, `false` when unset.
    pub fn is_disabled(&self) -> bool {
        matches!(self.document.meta().get(meta::IS_DISABLED), Some(Bson::Boolean(true)))
    }

    pub fn set_disabled(&mut self, disabled: bool) -> EntityResult<&mut Self> {
        self.set_meta(meta::IS_DISABLED, disabled)
    }

    /// `{ Id, Data }`, the id rendered as a hex string.
    pub fn id_and_data(&self) -> EntityResult<Document> {
        let mut pair = Document::new();
        pair.insert("Id", self.get_id_string()?);
        pair.insert("Data", self.data().clone());
        Ok(pair)
    }

    /// `{ Id, Info }`, the id rendered as a hex string.
    pub fn id_and_info(&self) -> EntityResult<Document> {
        let mut pair = Document::new();
        pair.insert("Id", self.get_id_string()?);
        pair.insert("Info", self.info().clone());
        Ok(pair)
    }

    /// Reads a string field, failing with an invariant violation on another type.
    pub fn get_str(&self, section: RootSection, name: &str) -> EntityResult<&str> {
        match self.get_field(section, name)? {
            Bson::String(value) => Ok(value),
            other => Err(EntityError::invariant(format!(
                "{section}.{name} is not a string: {other}"
            ))),
        }
    }

    // Persistence

    /// Inserts a detached entity into its collection and adopts the id and creation
    /// time chosen by the store.
    pub async fn add_to_collection(&mut self) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        if self.is_in_collection {
            return Err(EntityError::AlreadyPersisted(self.describe()));
        }

        let (id, created) = self.wrapper.add_one_entity(&self.document).await?;
        self.document.set_id(id);
        self.write_meta_time(meta::CREATION_TIME, created)?;
        self.is_in_collection = true;
        self.is_same_as_collection = true;
        debug!(target: "docent::entity", entity = self.entity_name(), id = %id, "added to collection");

        Ok(self)
    }

    /// Replaces the stored document by the in-memory one and adopts the modification
    /// time chosen by the store.
    pub async fn update_to_collection(&mut self) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        if !self.is_in_collection {
            return Err(EntityError::NotPersisted(self.describe()));
        }

        let id = self.get_id()?;
        let modified = self
            .wrapper
            .update_the_only_one_entity(id, &self.document)
            .await?;
        self.write_meta_time(meta::MODIFICATION_TIME, modified)?;
        self.is_same_as_collection = true;
        debug!(target: "docent::entity", entity = self.entity_name(), id = %id, "updated in collection");

        Ok(self)
    }

    fn get_field(&self, section: RootSection, name: &str) -> EntityResult<&Bson> {
        ensure_field_name(name)?;
        self.document
            .keyed(section)?
            .get(name)
            .ok_or_else(|| field_not_found(name, section))
    }

    fn get_field_or(&self, section: RootSection, name: &str, default: Bson) -> EntityResult<Bson> {
        ensure_field_name(name)?;
        Ok(self
            .document
            .keyed(section)?
            .get(name)
            .cloned()
            .unwrap_or(default))
    }

    fn set_field(&mut self, section: RootSection, name: &str, value: Bson) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        ensure_field_name(name)?;
        self.document.keyed_mut(section)?.insert(name, value);
        self.mark_dirty();
        Ok(self)
    }

    fn replace_section(&mut self, section: RootSection, fields: Document) -> EntityResult<&mut Self> {
        self.ensure_not_read_only()?;
        if fields.keys().any(|key| key.is_empty()) {
            return Err(EntityError::invariant(format!(
                "root section {section} cannot hold an empty field name"
            )));
        }
        *self.document.keyed_mut(section)? = fields;
        self.mark_dirty();
        Ok(self)
    }

    fn write_meta_time(&mut self, key: &str, time: DateTime) -> EntityResult<()> {
        self.document
            .keyed_mut(RootSection::Meta)?
            .insert(key, time);
        Ok(())
    }

    fn meta_time(&self, key: &str) -> EntityResult<Option<chrono::DateTime<Utc>>> {
        match self.document.meta().get(key) {
            None => Ok(None),
            Some(Bson::DateTime(time)) => Ok(Some(time.to_chrono())),
            Some(other) => Err(EntityError::invariant(format!(
                "Meta.{key} is not a date: {other}"
            ))),
        }
    }

    fn mark_dirty(&mut self) {
        self.is_same_as_collection = false;
    }

    fn describe(&self) -> String {
        match self.document.id() {
            Some(id) => format!("{}({})", self.entity_name(), id_to_string(id)),
            None => format!("{}(detached)", self.entity_name()),
        }
    }
}

impl AsRef<Entity> for Entity {
    fn as_ref(&self) -> &Entity {
        self
    }
}

impl AsMut<Entity> for Entity {
    fn as_mut(&mut self) -> &mut Entity {
        self
    }
}

fn ensure_field_name(name: &str) -> EntityResult<()> {
    if name.is_empty() {
        Err(EntityError::invariant("field name must not be empty"))
    } else {
        Ok(())
    }
}

fn field_not_found(name: &str, section: RootSection) -> EntityError {
    EntityError::FieldNotFound(name.to_string(), section.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bson::doc;

    use super::*;
    use crate::{
        adapter::StoreCollection,
        backend::{InsertOutcome, StoreBackend, UpdateOutcome},
        query::{Expr, Query},
    };

    /// A backend for pure in-memory tests; any store call is a bug.
    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl StoreBackend for Unreachable {
        async fn find(&self, _: &str, _: Query) -> EntityResult<Vec<Document>> {
            unreachable!("no store access expected")
        }

        async fn insert_one(&self, _: &str, _: Document) -> EntityResult<InsertOutcome> {
            unreachable!("no store access expected")
        }

        async fn update_one_by_id(
            &self,
            _: &str,
            _: ObjectId,
            _: Document,
        ) -> EntityResult<UpdateOutcome> {
            unreachable!("no store access expected")
        }

        async fn count_matching(
            &self,
            _: &str,
            _: Option<Expr>,
            _: Option<usize>,
            _: Option<usize>,
        ) -> EntityResult<u64> {
            unreachable!("no store access expected")
        }

        async fn remove_matching(&self, _: &str, _: Option<Expr>) -> EntityResult<u64> {
            unreachable!("no store access expected")
        }
    }

    fn wrapper(entity_name: &str) -> Arc<CollectionWrapper> {
        let collection = StoreCollection::new(entity_name, Arc::new(Unreachable));
        Arc::new(CollectionWrapper::new(collection, entity_name))
    }

    fn persisted(entity_name: &str) -> Entity {
        let stored = doc! { "_id": ObjectId::new(), "Meta": { "Type": entity_name } };
        Entity::hydrate(wrapper(entity_name), stored).unwrap()
    }

    #[test]
    fn detached_entity_starts_empty() {
        let entity = Entity::detached(wrapper("User"));

        assert!(!entity.check_is_in_collection());
        assert!(entity.data().is_empty());
        assert_eq!(entity.get_type().unwrap(), "User");
        assert!(matches!(entity.get_id(), Err(EntityError::NotPersisted(_))));
        assert!(matches!(entity.creation_time(), Err(EntityError::NotPersisted(_))));
    }

    #[test]
    fn hydration_requires_an_id() {
        let err = Entity::hydrate(wrapper("User"), doc! { "Data": {} }).unwrap_err();

        assert!(err.is_fatal());
    }

    #[test]
    fn sections_round_trip_and_mark_dirty() {
        let mut entity = persisted("User");
        assert!(entity.check_is_same_as_collection());

        entity.set_data("Score", 7).unwrap();
        entity.set_info("Username", "alice").unwrap();
        entity.set_meta(meta::STATE, "active").unwrap();

        assert_eq!(entity.get_data("Score").unwrap(), &Bson::Int32(7));
        assert_eq!(entity.get_str(RootSection::Info, "Username").unwrap(), "alice");
        assert_eq!(entity.get_state().unwrap(), &Bson::String("active".into()));
        assert!(!entity.check_is_same_as_collection());
    }

    #[test]
    fn missing_fields_fail_or_default() {
        let entity = persisted("User");

        match entity.get_info("Email").unwrap_err() {
            EntityError::FieldNotFound(field, section) => {
                assert_eq!(field, "Email");
                assert_eq!(section, "Info");
            }
            other => panic!("expected a missing field, got {other:?}"),
        }
        assert_eq!(entity.get_info_or("Email", "none").unwrap(), Bson::String("none".into()));
    }

    #[test]
    fn empty_field_names_are_invariant_violations() {
        let mut entity = persisted("User");

        assert!(entity.set_data("", 1).unwrap_err().is_fatal());
        assert!(entity.get_info_or("", 1).unwrap_err().is_fatal());
        assert!(entity.replace_info(doc! { "": 1 }).unwrap_err().is_fatal());
    }

    #[test]
    fn store_managed_meta_keys_are_protected() {
        let mut entity = persisted("User");
        let created = DateTime::now();
        entity.write_meta_time(meta::CREATION_TIME, created).unwrap();

        assert!(entity.set_meta(meta::CREATION_TIME, DateTime::now()).is_err());

        entity
            .replace_meta(doc! { "Type": "Admin", "CreationTime": DateTime::MIN })
            .unwrap();
        assert_eq!(entity.get_meta(meta::CREATION_TIME).unwrap(), &Bson::DateTime(created));
        assert_eq!(entity.get_type().unwrap(), "Admin");
    }

    #[test]
    fn read_only_blocks_mutators_but_not_reads() {
        let mut entity = persisted("User");
        entity.set_info("Username", "alice").unwrap();
        entity.set_read_only();

        assert!(matches!(entity.set_info("Username", "bob"), Err(EntityError::ReadOnly(_))));
        assert!(matches!(entity.set_signature("sig"), Err(EntityError::ReadOnly(_))));
        assert!(matches!(entity.replace_data(Document::new()), Err(EntityError::ReadOnly(_))));
        assert!(entity.get_name().is_err());
        assert_eq!(entity.get_str(RootSection::Info, "Username").unwrap(), "alice");
        assert!(entity.is_read_only());
    }

    #[test]
    fn signature_is_write_once() {
        let mut entity = Entity::detached(wrapper("User"));
        entity.set_signature("alice@example.com").unwrap();

        let err = entity.set_signature("other@example.com").unwrap_err();

        assert!(matches!(err, EntityError::DuplicateWrite(_)));
        assert_eq!(
            entity.get_signature(),
            Some(&Bson::String("alice@example.com".into()))
        );
    }

    #[test]
    fn stored_null_signature_can_still_be_written() {
        let stored = doc! {
            "_id": ObjectId::new(),
            "Signature": Bson::Null,
            "Meta": { "Type": "User" },
        };
        let mut entity = Entity::hydrate(wrapper("User"), stored).unwrap();
        assert!(entity.get_signature().is_none());

        entity.set_signature("alice@example.com").unwrap();

        assert_eq!(
            entity.get_signature(),
            Some(&Bson::String("alice@example.com".into()))
        );
    }

    #[test]
    fn one_reference_uses_the_kind_name_and_detects_conflicts() {
        let group = persisted("Group");
        let other_group = persisted("Group");
        let mut user = persisted("User");

        user.build_one_reference(&group, None, true).unwrap();
        user.build_one_reference(&group, None, true).unwrap();
        assert_eq!(
            user.get_reference("GroupId").unwrap(),
            &Bson::ObjectId(group.get_id().unwrap())
        );

        let err = user.build_one_reference(&other_group, None, true).unwrap_err();
        assert!(matches!(err, EntityError::ReferenceConflict(name, _, _) if name == "GroupId"));

        user.build_one_reference(&other_group, Some("OwnerId"), false).unwrap();
        assert!(user.has_reference("OwnerId"));
    }

    #[test]
    fn references_to_detached_targets_fail() {
        let detached = Entity::detached(wrapper("Group"));
        let mut user = persisted("User");

        assert!(matches!(
            user.build_one_reference(&detached, None, false),
            Err(EntityError::NotPersisted(_))
        ));
        assert!(!user.has_reference("GroupId"));
    }

    #[test]
    fn multi_reference_honors_duplicate_check() {
        let post = persisted("Post");

        let mut checked = persisted("User");
        checked.build_multi_reference(&post, None, true).unwrap();
        checked.build_multi_reference(&post, None, true).unwrap();

        let mut unchecked = persisted("User");
        unchecked.build_multi_reference(&post, None, false).unwrap();
        unchecked.build_multi_reference(&post, None, false).unwrap();

        let len = |entity: &Entity| match entity.get_reference("PostIdList").unwrap() {
            Bson::Array(ids) => ids.len(),
            other => panic!("expected an id list, got {other}"),
        };
        assert_eq!(len(&checked), 1);
        assert_eq!(len(&unchecked), 2);
    }

    #[test]
    fn id_pairs_render_the_hex_id() {
        let mut entity = persisted("User");
        entity.set_data("Score", 3).unwrap();

        let pair = entity.id_and_data().unwrap();

        assert_eq!(pair.get_str("Id").unwrap(), entity.get_id().unwrap().to_hex());
        assert_eq!(pair.get_document("Data").unwrap(), &doc! { "Score": 3 });
    }

    #[test]
    fn disabled_flag_defaults_to_false() {
        let mut entity = persisted("User");
        assert!(!entity.is_disabled());

        entity.set_disabled(true).unwrap();
        assert!(entity.is_disabled());
    }
}
