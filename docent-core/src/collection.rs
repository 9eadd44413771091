//! Collection accessors.
//!
//! A [`Collection<M>`] is the typed entry point to one collection of entities of model
//! `M`. It is obtained from [`crate::store::EntityStore::collection`] and is cheap to
//! clone; all clones share the store's single wrapper for the collection name.
//!
//! Operations come in two tiers, mirrored by the [`BASE_COLLECTION`] visibility table:
//!
//! - **public**: id/signature existence, counting everything, signature lookup,
//!   creating a detached entity;
//! - **protected**: the criterion-based primitives domain collections build their own
//!   queries on (see the `User` collection of the facade crate).
//!
//! Direct Rust calls are checked by the compiler. Calls that arrive by name go through
//! [`Collection::invoke`], which resolves the caller on a [`CallStack`] first.
//!
//! # Example
//!
//! ```ignore
//! let users = store.collection::<UserEntity>()?;
//! let mut alice = users.create_entity()?;
//! alice.set_username("alice")?;
//! alice.add_to_collection().await?;
//!
//! assert!(users.check_exists_id(alice.get_id()?).await?);
//! ```

use std::{marker::PhantomData, sync::Arc};

use bson::{Bson, oid::ObjectId};
use tracing::debug;

use crate::{
    access::{CallStack, ClassDescriptor, Frame, MethodsVisibility, Visible},
    bulk::EntityBulk,
    entity::{Entity, EntityModel},
    error::{EntityError, EntityResult},
    query::{Expr, Filter, Query, Sort},
    wrapper::CollectionWrapper,
};

/// Visibility table of the base collection accessor.
pub static BASE_COLLECTION: ClassDescriptor = ClassDescriptor::new(
    "BaseCollection",
    None,
    &[
        "check_exists_id",
        "check_exists_signature",
        "count_all",
        "get_the_only_one_entity_by_signature",
        "create_entity",
        "check_exist_entities",
        "ensure_exist_entities",
        "check_exists_only_one_entity",
        "ensure_exists_only_one_entity",
        "count_entities",
        "get_multi_entities",
        "get_the_only_one_entity",
        "get_one_entity",
        "remove_multi_entities",
    ],
    MethodsVisibility::new(
        &[
            "check_exists_id",
            "check_exists_signature",
            "count_all",
            "get_the_only_one_entity_by_signature",
            "create_entity",
        ],
        &[
            "check_exist_entities",
            "ensure_exist_entities",
            "check_exists_only_one_entity",
            "ensure_exists_only_one_entity",
            "count_entities",
            "get_multi_entities",
            "get_the_only_one_entity",
            "get_one_entity",
            "remove_multi_entities",
        ],
    ),
);

/// A collection operation addressed by name, for [`Collection::invoke`].
#[derive(Debug, Clone)]
pub enum CollectionCall {
    CheckExistsId(Bson),
    CheckExistsSignature(Bson),
    CountAll,
    GetTheOnlyOneEntityBySignature(Bson),
    CreateEntity,
    CheckExistEntities(Expr),
    EnsureExistEntities(Expr),
    CheckExistsOnlyOneEntity(Expr),
    EnsureExistsOnlyOneEntity(Expr),
    CountEntities {
        criterion: Option<Expr>,
        skip: Option<usize>,
        limit: Option<usize>,
    },
    GetMultiEntities(Query),
    GetTheOnlyOneEntity(Expr),
    GetOneEntity {
        criterion: Expr,
        sort: Vec<Sort>,
        skip: Option<usize>,
        limit: Option<usize>,
    },
    RemoveMultiEntities(Expr),
}

impl CollectionCall {
    /// Name of the method this call addresses in the visibility table.
    pub fn method(&self) -> &'static str {
        match self {
            CollectionCall::CheckExistsId(_) => "check_exists_id",
            CollectionCall::CheckExistsSignature(_) => "check_exists_signature",
            CollectionCall::CountAll => "count_all",
            CollectionCall::GetTheOnlyOneEntityBySignature(_) => {
                "get_the_only_one_entity_by_signature"
            }
            CollectionCall::CreateEntity => "create_entity",
            CollectionCall::CheckExistEntities(_) => "check_exist_entities",
            CollectionCall::EnsureExistEntities(_) => "ensure_exist_entities",
            CollectionCall::CheckExistsOnlyOneEntity(_) => "check_exists_only_one_entity",
            CollectionCall::EnsureExistsOnlyOneEntity(_) => "ensure_exists_only_one_entity",
            CollectionCall::CountEntities { .. } => "count_entities",
            CollectionCall::GetMultiEntities(_) => "get_multi_entities",
            CollectionCall::GetTheOnlyOneEntity(_) => "get_the_only_one_entity",
            CollectionCall::GetOneEntity { .. } => "get_one_entity",
            CollectionCall::RemoveMultiEntities(_) => "remove_multi_entities",
        }
    }
}

/// The result of an invoked [`CollectionCall`].
#[derive(Debug)]
pub enum CollectionReply<M> {
    Unit,
    Bool(bool),
    Count(u64),
    Entity(M),
    Bulk(EntityBulk<M>),
}

pub struct Collection<M> {
    wrapper: Option<Arc<CollectionWrapper>>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self { wrapper: self.wrapper.clone(), _model: PhantomData }
    }
}

impl<M> std::fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("wrapper", &self.wrapper)
            .finish()
    }
}

impl<M> Visible for Collection<M> {
    fn class() -> &'static ClassDescriptor {
        &BASE_COLLECTION
    }
}

impl<M: EntityModel> Collection<M> {
    pub(crate) fn new(wrapper: Option<Arc<CollectionWrapper>>) -> Self {
        Self { wrapper, _model: PhantomData }
    }

    /// Name of the bound collection, if any.
    pub fn name(&self) -> Option<&str> {
        self.wrapper.as_deref().map(CollectionWrapper::collection_name)
    }

    /// The shared wrapper. Fails with [`EntityError::UninitializedCollection`] when the
    /// model declares no collection.
    pub fn ensure_initialized(&self) -> EntityResult<&Arc<CollectionWrapper>> {
        self.wrapper
            .as_ref()
            .ok_or_else(|| EntityError::UninitializedCollection(M::ENTITY_NAME.to_string()))
    }

    // Public tier

    /// Whether an entity with `id` exists. Hex strings are accepted; a malformed id
    /// simply does not exist.
    pub async fn check_exists_id(&self, id: impl Into<Bson>) -> EntityResult<bool> {
        self.check_exist_entities(Filter::id(id)).await
    }

    pub async fn check_exists_signature(&self, signature: impl Into<Bson>) -> EntityResult<bool> {
        self.check_exist_entities(Filter::signature(signature)).await
    }

    pub async fn count_all(&self) -> EntityResult<u64> {
        self.count_entities(None, None, None).await
    }

    /// # Errors
    ///
    /// [`EntityError::NotFound`] when no entity has the signature and
    /// [`EntityError::AmbiguousResult`] when several do.
    pub async fn get_the_only_one_entity_by_signature(
        &self,
        signature: impl Into<Bson>,
    ) -> EntityResult<M> {
        self.get_the_only_one_entity(Filter::signature(signature)).await
    }

    /// A new detached entity bound to this collection.
    pub fn create_entity(&self) -> EntityResult<M> {
        let wrapper = self.ensure_initialized()?;
        Ok(M::from(Entity::detached(Arc::clone(wrapper))))
    }

    // Protected tier

    pub async fn check_exist_entities(&self, criterion: Expr) -> EntityResult<bool> {
        self.ensure_initialized()?
            .collection()
            .check_existence(criterion)
            .await
    }

    /// # Errors
    ///
    /// [`EntityError::NotFound`] when nothing matches.
    pub async fn ensure_exist_entities(&self, criterion: Expr) -> EntityResult<()> {
        self.ensure_initialized()?
            .collection()
            .ensure_existence(criterion)
            .await
    }

    pub async fn check_exists_only_one_entity(&self, criterion: Expr) -> EntityResult<bool> {
        self.ensure_initialized()?
            .collection()
            .check_exists_only_once(criterion)
            .await
    }

    /// # Errors
    ///
    /// [`EntityError::NotFound`] on zero matches, [`EntityError::AmbiguousResult`] on
    /// two or more.
    pub async fn ensure_exists_only_one_entity(&self, criterion: Expr) -> EntityResult<()> {
        self.ensure_initialized()?
            .collection()
            .ensure_exists_only_once(criterion)
            .await
    }

    /// Counts matching entities inside the `skip`/`limit` window. `None` counts all.
    pub async fn count_entities(
        &self,
        criterion: Option<Expr>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<u64> {
        self.ensure_initialized()?
            .collection()
            .count(criterion, skip, limit)
            .await
    }

    /// A lazy handle over the entities matching `query`.
    ///
    /// The query's filter, sort, offset, limit and timeout are honored. Its projection
    /// is dropped: entities are always loaded whole.
    pub fn get_multi_entities(&self, mut query: Query) -> EntityResult<EntityBulk<M>> {
        let wrapper = self.ensure_initialized()?;
        query.projection = None;
        Ok(EntityBulk::from_query(Arc::clone(wrapper), query))
    }

    /// # Errors
    ///
    /// [`EntityError::NotFound`] on zero matches, [`EntityError::AmbiguousResult`] on
    /// two or more.
    pub async fn get_the_only_one_entity(&self, criterion: Expr) -> EntityResult<M> {
        let wrapper = self.ensure_initialized()?;
        let document = wrapper.collection().get_the_only_one(criterion, None).await?;
        Entity::hydrate(Arc::clone(wrapper), document).map(M::from)
    }

    /// The first entity matching `criterion` under `sort`, after skipping `skip`.
    pub async fn get_one_entity(
        &self,
        criterion: Expr,
        sort: Vec<Sort>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> EntityResult<M> {
        let wrapper = self.ensure_initialized()?;
        let document = wrapper
            .collection()
            .get_one(criterion, None, sort, skip, limit)
            .await?;
        Entity::hydrate(Arc::clone(wrapper), document).map(M::from)
    }

    /// Deletes every matching entity from the store and returns how many were removed.
    pub async fn remove_multi_entities(&self, criterion: Expr) -> EntityResult<u64> {
        self.ensure_initialized()?
            .collection()
            .remove(Some(criterion))
            .await
    }

    pub(crate) fn bulk_by_ids(&self, ids: Vec<ObjectId>) -> EntityResult<EntityBulk<M>> {
        let wrapper = self.ensure_initialized()?;
        Ok(EntityBulk::from_ids(Arc::clone(wrapper), ids))
    }

    // Dynamic dispatch

    /// Runs a call addressed by name on behalf of the context described by `stack`,
    /// using the base collection's visibility table.
    pub async fn invoke(
        &self,
        stack: &mut CallStack,
        call: CollectionCall,
    ) -> EntityResult<CollectionReply<M>> {
        self.invoke_as(Self::class(), stack, call).await
    }

    /// Like [`Collection::invoke`], resolving visibility from `class`, the descriptor
    /// of a domain collection built on this one.
    pub async fn invoke_as(
        &self,
        class: &'static ClassDescriptor,
        stack: &mut CallStack,
        call: CollectionCall,
    ) -> EntityResult<CollectionReply<M>> {
        let method = call.method();
        let record = stack.ensure_accessible(class, method)?;
        debug!(target: "docent::collection", record = %record, "dispatching");

        let declaring = class.declaring_class(method).unwrap_or(class);
        stack.push(Frame::new(declaring, method));
        let reply = self.dispatch(call).await;
        stack.pop();

        reply
    }

    async fn dispatch(&self, call: CollectionCall) -> EntityResult<CollectionReply<M>> {
        Ok(match call {
            CollectionCall::CheckExistsId(id) => CollectionReply::Bool(self.check_exists_id(id).await?),
            CollectionCall::CheckExistsSignature(signature) => {
                CollectionReply::Bool(self.check_exists_signature(signature).await?)
            }
            CollectionCall::CountAll => CollectionReply::Count(self.count_all().await?),
            CollectionCall::GetTheOnlyOneEntityBySignature(signature) => {
                CollectionReply::Entity(self.get_the_only_one_entity_by_signature(signature).await?)
            }
            CollectionCall::CreateEntity => CollectionReply::Entity(self.create_entity()?),
            CollectionCall::CheckExistEntities(criterion) => {
                CollectionReply::Bool(self.check_exist_entities(criterion).await?)
            }
            CollectionCall::EnsureExistEntities(criterion) => {
                self.ensure_exist_entities(criterion).await?;
                CollectionReply::Unit
            }
            CollectionCall::CheckExistsOnlyOneEntity(criterion) => {
                CollectionReply::Bool(self.check_exists_only_one_entity(criterion).await?)
            }
            CollectionCall::EnsureExistsOnlyOneEntity(criterion) => {
                self.ensure_exists_only_one_entity(criterion).await?;
                CollectionReply::Unit
            }
            CollectionCall::CountEntities { criterion, skip, limit } => {
                CollectionReply::Count(self.count_entities(criterion, skip, limit).await?)
            }
            CollectionCall::GetMultiEntities(query) => {
                CollectionReply::Bulk(self.get_multi_entities(query)?)
            }
            CollectionCall::GetTheOnlyOneEntity(criterion) => {
                CollectionReply::Entity(self.get_the_only_one_entity(criterion).await?)
            }
            CollectionCall::GetOneEntity { criterion, sort, skip, limit } => {
                CollectionReply::Entity(self.get_one_entity(criterion, sort, skip, limit).await?)
            }
            CollectionCall::RemoveMultiEntities(criterion) => {
                CollectionReply::Count(self.remove_multi_entities(criterion).await?)
            }
        })
    }
}
