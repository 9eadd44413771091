//! Sectioned entities and collection accessors over a JSON document store.
//!
//! This crate is the primary entry point of the docent framework. It re-exports the
//! core types from the sub-crates, exposes the storage backends and ships the
//! built-in [`models::UserEntity`] model.
//!
//! # Features
//!
//! - **Sectioned entities** - Every document has `Data`, `Info`, `Signature`, `Reference` and `Meta`
//! - **Lifecycle tracking** - Detached, persisted and dirty states with read-only latching
//! - **Collection invariants** - Existence and "exactly one" checks in a single round trip
//! - **References** - Single and ordered multi-valued links between entities
//! - **Runtime visibility** - Public/protected/private tiers for by-name calls
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docent::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> EntityResult<()> {
//!     let store = EntityStore::new(InMemoryStore::builder().build().await?);
//!     let users = UserCollection::new(&store)?;
//!
//!     let mut alice = users.create_entity()?;
//!     alice.set_username("alice")?.set_email("alice@example.com")?;
//!     alice.set_signature("alice@example.com")?;
//!     alice.add_to_collection().await?;
//!
//!     let found = users.get_user_by_username("alice").await?;
//!     assert_eq!(found.get_id()?, alice.get_id()?);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Dynamic calls
//!
//! Operations addressed by name, e.g. from a request router, go through
//! [`collection::Collection::invoke`] with the caller's [`access::CallStack`]. Protected
//! operations are then only reachable from frames of the collection's own class or a
//! descendant.
//!
//! ```ignore
//! let mut stack = CallStack::new();
//! let reply = users.invoke(&mut stack, CollectionCall::CountAll).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod models;
pub mod prelude;

pub use docent_core::{
    access, adapter, backend, bulk, collection, document, entity, error, id, query, registry,
    store, wrapper,
};
pub use docent_core::{
    entity::{Entity, EntityModel},
    error::{EntityError, EntityResult},
    store::EntityStore,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docent_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docent_mongodb::{MongoDbConfig, MongoDbStore, MongoDbStoreBuilder};
}
