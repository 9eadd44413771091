//! The entity store: a backend plus its collection wrappers.
//!
//! # Example
//!
//! ```ignore
//! use docent::memory::InMemoryStore;
//! use docent::store::EntityStore;
//!
//! let store = EntityStore::new(InMemoryStore::new());
//! let users = store.collection::<UserEntity>()?;
//! ```

use std::sync::Arc;

use crate::{
    adapter::StoreCollection,
    backend::StoreBackend,
    collection::Collection,
    entity::EntityModel,
    error::{EntityError, EntityResult},
    registry::Registry,
    wrapper::CollectionWrapper,
};

/// Entry point to entities held by one backend.
///
/// The store keeps at most one [`CollectionWrapper`] per collection name for its whole
/// lifetime. An application normally creates a single store and shares it.
#[derive(Debug)]
pub struct EntityStore {
    backend: Arc<dyn StoreBackend>,
    wrappers: Registry<CollectionWrapper>,
}

impl EntityStore {
    /// Creates a new entity store over the given backend.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend, wrappers: Registry::new() }
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Returns the wrapper of `collection`, creating it on first use.
    ///
    /// # Errors
    ///
    /// An [`EntityError::InvariantViolation`] when the collection is already bound to
    /// another entity kind.
    pub fn wrapper(&self, collection: &str, entity_name: &str) -> EntityResult<Arc<CollectionWrapper>> {
        let wrapper = self.wrappers.get_or_init(collection, || {
            CollectionWrapper::new(
                StoreCollection::new(collection, Arc::clone(&self.backend)),
                entity_name,
            )
        });

        if wrapper.entity_name() != entity_name {
            return Err(EntityError::invariant(format!(
                "collection {collection} holds {} entities, not {entity_name}",
                wrapper.entity_name()
            )));
        }
        Ok(wrapper)
    }

    /// The accessor for model `M`.
    ///
    /// A model without a collection name yields an accessor whose every operation fails
    /// with [`EntityError::UninitializedCollection`].
    pub fn collection<M: EntityModel>(&self) -> EntityResult<Collection<M>> {
        let wrapper = M::COLLECTION_NAME
            .map(|name| self.wrapper(name, M::ENTITY_NAME))
            .transpose()?;
        Ok(Collection::new(wrapper))
    }

    /// Raw document access to a collection, bypassing the entity layer.
    pub fn raw_collection(&self, name: &str) -> StoreCollection {
        StoreCollection::new(name, Arc::clone(&self.backend))
    }

    /// Releases backend resources.
    pub async fn shutdown(&self) -> EntityResult<()> {
        self.backend.shutdown().await
    }
}
