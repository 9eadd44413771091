//! Sectioned entities over a schemaless document store.
//!
//! This crate is the core of the docent project and provides:
//!
//! - **Errors** ([`error`]) - the [`error::EntityError`] taxonomy
//! - **Sectioned documents** ([`document`]) - the five root sections and their stored form
//! - **Identifiers** ([`id`]) - `_id` normalization
//! - **Query and filtering API** ([`query`]) - criterion trees, sorting and windowing
//! - **Store backend abstraction** ([`backend`]) - traits for implementing storage backends
//! - **Collection adapter** ([`adapter`]) - id normalization, insert/update write-back, "only one" reads
//! - **Entities** ([`entity`]) - lifecycle, sectioned field access, references, persistence
//! - **Collections** ([`collection`]) - typed accessors and by-name dispatch
//! - **Bulk results** ([`bulk`]) - lazy multi-entity handles
//! - **Access control** ([`access`]) - runtime method visibility for dynamic call sites
//! - **Entity store** ([`store`]) - one wrapper per collection name over a backend
//!
//! # Example
//!
//! ```ignore
//! use docent::{Entity, EntityModel, EntityStore};
//!
//! pub struct Article(Entity);
//!
//! impl EntityModel for Article {
//!     const ENTITY_NAME: &'static str = "Article";
//!     const COLLECTION_NAME: Option<&'static str> = Some("Article");
//! }
//!
//! let articles = store.collection::<Article>()?;
//! let mut article = articles.create_entity()?;
//! article.as_mut().set_info("Title", "Hello")?;
//! article.as_mut().add_to_collection().await?;
//! ```

pub mod access;
pub mod adapter;
pub mod backend;
pub mod bulk;
pub mod collection;
pub mod document;
pub mod entity;
pub mod error;
pub mod id;
pub mod query;
pub mod registry;
pub mod store;
pub mod wrapper;
