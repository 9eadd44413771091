//! In-memory document storage backend for docent.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development, tests and small embedded deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Store-side stamping** - `_id` assignment and `Meta.CreationTime`/`Meta.ModificationTime`
//! - **Query support** - Dotted-path filtering, multi-key sorting, windowing and projection
//! - **Unique fields** - Optional per-collection uniqueness, reported as duplicate inserts
//!
//! # Quick Start
//!
//! ```ignore
//! use docent::{EntityStore, memory::InMemoryStore, backend::StoreBackendBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder()
//!         .unique("User", "Signature")
//!         .build()
//!         .await?;
//!     let store = EntityStore::new(backend);
//!     let users = store.collection::<docent::models::UserEntity>()?;
//!
//!     let mut alice = users.create_entity()?;
//!     alice.set_username("alice")?;
//!     alice.add_to_collection().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
