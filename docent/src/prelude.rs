//! Convenient re-exports of commonly used types from docent.
//!
//! ```ignore
//! use docent::prelude::*;
//! ```
//!
//! This provides access to:
//! - Entities, models and collections
//! - Store backends and builders
//! - Query construction and filtering
//! - Access control for by-name calls
//! - Error types

pub use docent_core::{
    access::{CallStack, ClassDescriptor, Frame, MethodAccessibility, MethodsVisibility, Visible, Visibility},
    backend::{StoreBackend, StoreBackendBuilder},
    bulk::EntityBulk,
    collection::{Collection, CollectionCall, CollectionReply},
    document::{EntityDocument, RootSection},
    entity::{Entity, EntityModel},
    error::{EntityError, EntityResult},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::EntityStore,
};

pub use crate::models::{UserCollection, UserCollectionCall, UserEntity};
