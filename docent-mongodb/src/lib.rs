//! MongoDB backend implementation for docent.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docent = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Entities live in a self-hosted or managed MongoDB deployment
//! - **Native queries** - Criteria are translated to MongoDB filter documents
//! - **Duplicate detection** - Unique index violations surface as duplicate inserts
//! - **Key sanitization** - Section field names may contain `.` and `$`
//!
//! # Example
//!
//! ```ignore
//! use docent::{backend::StoreBackendBuilder, mongodb::{MongoDbConfig, MongoDbStoreBuilder}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MongoDbConfig { database: "app".into(), ..MongoDbConfig::default() };
//!     let backend = MongoDbStoreBuilder::from_config(&config).build().await?;
//!     backend.create_unique_index("User", "Signature").await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod query;
pub mod sanitizer;
pub mod store;

pub use config::MongoDbConfig;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
