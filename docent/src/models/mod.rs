//! Entity models shipped with docent.

pub mod user;

pub use user::{USER_COLLECTION, UserCollection, UserCollectionCall, UserEntity};
