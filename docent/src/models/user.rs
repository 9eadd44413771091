//! The built-in user model.
//!
//! Users keep their credentials and contact data in `Info`:
//!
//! | field           | type     |
//! |-----------------|----------|
//! | `Username`      | string   |
//! | `Password`      | string   |
//! | `Email`         | string   |
//! | `LastLoginTime` | datetime |
//!
//! Password hashing is the application's business; the stored value is whatever it
//! hands over.

use std::ops::{Deref, DerefMut};

use bson::{Bson, DateTime, Document};
use chrono::Utc;

use docent_core::{
    access::{CallStack, ClassDescriptor, Frame, MethodsVisibility, Visible},
    collection::{BASE_COLLECTION, Collection, CollectionCall, CollectionReply},
    document::RootSection,
    entity::{Entity, EntityModel},
    error::{EntityError, EntityResult},
    query::Filter,
    store::EntityStore,
};

const USERNAME: &str = "Username";
const PASSWORD: &str = "Password";
const EMAIL: &str = "Email";
const LAST_LOGIN_TIME: &str = "LastLoginTime";

#[derive(Debug, Clone)]
pub struct UserEntity(Entity);

impl EntityModel for UserEntity {
    const ENTITY_NAME: &'static str = "User";
    const COLLECTION_NAME: Option<&'static str> = Some("User");
}

impl From<Entity> for UserEntity {
    fn from(entity: Entity) -> Self {
        Self(entity)
    }
}

impl AsRef<Entity> for UserEntity {
    fn as_ref(&self) -> &Entity {
        &self.0
    }
}

impl AsMut<Entity> for UserEntity {
    fn as_mut(&mut self) -> &mut Entity {
        &mut self.0
    }
}

impl Deref for UserEntity {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.0
    }
}

impl DerefMut for UserEntity {
    fn deref_mut(&mut self) -> &mut Entity {
        &mut self.0
    }
}

impl UserEntity {
    pub fn username(&self) -> EntityResult<&str> {
        self.get_str(RootSection::Info, USERNAME)
    }

    pub fn set_username(&mut self, username: &str) -> EntityResult<&mut Self> {
        self.0.set_info(USERNAME, username)?;
        Ok(self)
    }

    pub fn password(&self) -> EntityResult<&str> {
        self.get_str(RootSection::Info, PASSWORD)
    }

    pub fn set_password(&mut self, password: &str) -> EntityResult<&mut Self> {
        self.0.set_info(PASSWORD, password)?;
        Ok(self)
    }

    pub fn email(&self) -> EntityResult<&str> {
        self.get_str(RootSection::Info, EMAIL)
    }

    pub fn set_email(&mut self, email: &str) -> EntityResult<&mut Self> {
        self.0.set_info(EMAIL, email)?;
        Ok(self)
    }

    /// Records a login at the current time. Persist with `update_to_collection`.
    pub fn login_now(&mut self) -> EntityResult<&mut Self> {
        self.0.set_info(LAST_LOGIN_TIME, DateTime::now())?;
        Ok(self)
    }

    pub fn last_login_time(&self) -> EntityResult<Option<chrono::DateTime<Utc>>> {
        match self.info().get(LAST_LOGIN_TIME) {
            None => Ok(None),
            Some(Bson::DateTime(time)) => Ok(Some(time.to_chrono())),
            Some(other) => Err(EntityError::InvariantViolation(format!(
                "Info.{LAST_LOGIN_TIME} is not a date: {other}"
            ))),
        }
    }

    /// `{ Id, Name, Type }`, for listings.
    pub fn abstract_view(&self) -> EntityResult<Document> {
        let mut view = Document::new();
        view.insert("Id", self.get_id_string()?);
        view.insert("Name", self.get_info_or("Name", Bson::Null)?);
        view.insert("Type", self.get_type()?);
        Ok(view)
    }

    /// The abstract view plus account details. Times are epoch milliseconds.
    pub fn detail(&self) -> EntityResult<Document> {
        let mut view = self.abstract_view()?;
        view.insert(USERNAME, self.username()?);
        view.insert(EMAIL, self.get_info_or(EMAIL, Bson::Null)?);
        view.insert("RegistrationTimestamp", self.creation_time()?.timestamp_millis());
        view.insert(
            "LastLoginTimestamp",
            self.last_login_time()?
                .map_or(Bson::Null, |time| Bson::Int64(time.timestamp_millis())),
        );
        Ok(view)
    }
}

/// Visibility table of [`UserCollection`].
pub static USER_COLLECTION: ClassDescriptor = ClassDescriptor::new(
    "UserCollection",
    Some(&BASE_COLLECTION),
    &["get_user_by_username", "check_exists_username"],
    MethodsVisibility::new(&["get_user_by_username", "check_exists_username"], &[]),
);

/// A [`UserCollection`] operation addressed by name.
#[derive(Debug, Clone)]
pub enum UserCollectionCall {
    /// An operation inherited from the base collection.
    Base(CollectionCall),
    GetUserByUsername(String),
    CheckExistsUsername(String),
}

impl UserCollectionCall {
    pub fn method(&self) -> &'static str {
        match self {
            UserCollectionCall::Base(call) => call.method(),
            UserCollectionCall::GetUserByUsername(_) => "get_user_by_username",
            UserCollectionCall::CheckExistsUsername(_) => "check_exists_username",
        }
    }
}

impl From<CollectionCall> for UserCollectionCall {
    fn from(call: CollectionCall) -> Self {
        UserCollectionCall::Base(call)
    }
}

/// The collection of [`UserEntity`] values.
#[derive(Debug, Clone)]
pub struct UserCollection {
    inner: Collection<UserEntity>,
}

impl Visible for UserCollection {
    fn class() -> &'static ClassDescriptor {
        &USER_COLLECTION
    }
}

impl UserCollection {
    pub fn new(store: &EntityStore) -> EntityResult<Self> {
        Ok(Self { inner: store.collection::<UserEntity>()? })
    }

    /// # Errors
    ///
    /// [`EntityError::NotFound`] when nobody has the username and
    /// [`EntityError::AmbiguousResult`] when several users share it.
    pub async fn get_user_by_username(&self, username: &str) -> EntityResult<UserEntity> {
        self.inner
            .get_the_only_one_entity(Filter::in_section(RootSection::Info, USERNAME, username))
            .await
    }

    pub async fn check_exists_username(&self, username: &str) -> EntityResult<bool> {
        self.inner
            .check_exist_entities(Filter::in_section(RootSection::Info, USERNAME, username))
            .await
    }

    /// Runs a call addressed by name, resolving visibility against the user
    /// collection's table.
    pub async fn invoke(
        &self,
        stack: &mut CallStack,
        call: impl Into<UserCollectionCall>,
    ) -> EntityResult<CollectionReply<UserEntity>> {
        match call.into() {
            UserCollectionCall::Base(call) => self.inner.invoke_as(Self::class(), stack, call).await,
            UserCollectionCall::GetUserByUsername(username) => self
                .guarded(stack, "get_user_by_username", self.get_user_by_username(&username))
                .await
                .map(CollectionReply::Entity),
            UserCollectionCall::CheckExistsUsername(username) => self
                .guarded(stack, "check_exists_username", self.check_exists_username(&username))
                .await
                .map(CollectionReply::Bool),
        }
    }

    async fn guarded<R>(
        &self,
        stack: &mut CallStack,
        method: &'static str,
        body: impl Future<Output = EntityResult<R>>,
    ) -> EntityResult<R> {
        stack.ensure_accessible(Self::class(), method)?;

        stack.push(Frame::new(Self::class(), method));
        let result = body.await;
        stack.pop();

        result
    }
}

impl Deref for UserCollection {
    type Target = Collection<UserEntity>;

    fn deref(&self) -> &Collection<UserEntity> {
        &self.inner
    }
}
