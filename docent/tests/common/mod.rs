#![allow(dead_code)]

use std::ops::{Deref, DerefMut};

use docent::{
    backend::StoreBackendBuilder,
    memory::InMemoryStore,
    prelude::*,
};

#[derive(Debug, Clone)]
pub struct Article(Entity);

impl EntityModel for Article {
    const ENTITY_NAME: &'static str = "Article";
    const COLLECTION_NAME: Option<&'static str> = Some("Article");
}

impl From<Entity> for Article {
    fn from(entity: Entity) -> Self {
        Self(entity)
    }
}

impl AsRef<Entity> for Article {
    fn as_ref(&self) -> &Entity {
        &self.0
    }
}

impl AsMut<Entity> for Article {
    fn as_mut(&mut self) -> &mut Entity {
        &mut self.0
    }
}

impl Deref for Article {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.0
    }
}

impl DerefMut for Article {
    fn deref_mut(&mut self) -> &mut Entity {
        &mut self.0
    }
}

/// A model that names no collection.
#[derive(Debug)]
pub struct Draft(Entity);

impl EntityModel for Draft {
    const ENTITY_NAME: &'static str = "Draft";
    const COLLECTION_NAME: Option<&'static str> = None;
}

impl From<Entity> for Draft {
    fn from(entity: Entity) -> Self {
        Self(entity)
    }
}

impl AsRef<Entity> for Draft {
    fn as_ref(&self) -> &Entity {
        &self.0
    }
}

impl AsMut<Entity> for Draft {
    fn as_mut(&mut self) -> &mut Entity {
        &mut self.0
    }
}

pub fn memory_store() -> EntityStore {
    EntityStore::new(InMemoryStore::new())
}

/// A store whose `User` and `Article` signatures are unique.
pub async fn unique_signature_store() -> EntityStore {
    let backend = InMemoryStore::builder()
        .unique("User", "Signature")
        .unique("Article", "Signature")
        .build()
        .await
        .unwrap();
    EntityStore::new(backend)
}

pub async fn add_user(users: &UserCollection, username: &str) -> UserEntity {
    let mut user = users.create_entity().unwrap();
    user.set_username(username).unwrap();
    user.add_to_collection().await.unwrap();
    user
}

pub async fn add_article(articles: &Collection<Article>, title: &str) -> Article {
    let mut article = articles.create_entity().unwrap();
    article.set_info("Title", title).unwrap();
    article.add_to_collection().await.unwrap();
    article
}
