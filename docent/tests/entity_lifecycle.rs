mod common;

use bson::{Bson, doc};
use docent::prelude::*;

use common::{Article, memory_store, unique_signature_store};

#[tokio::test]
async fn detached_until_added_then_persisted() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();

    let mut article = articles.create_entity().unwrap();
    assert!(!article.check_is_in_collection());
    assert!(matches!(article.get_id(), Err(EntityError::NotPersisted(_))));
    assert_eq!(article.get_type().unwrap(), "Article");

    article.set_data("Body", "hello").unwrap();
    article.add_to_collection().await.unwrap();

    assert!(article.check_is_in_collection());
    assert!(article.check_is_same_as_collection());
    let id = article.get_id().unwrap();
    assert_eq!(article.get_id_string().unwrap(), id.to_hex());
    assert!(article.creation_time().is_ok());
    assert!(articles.check_exists_id(id).await.unwrap());
    assert!(articles.check_exists_id(id.to_hex()).await.unwrap());
}

#[tokio::test]
async fn adding_twice_is_rejected() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();
    article.add_to_collection().await.unwrap();

    let err = article.add_to_collection().await.unwrap_err();

    assert!(matches!(err, EntityError::AlreadyPersisted(_)));
    assert_eq!(articles.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn updating_a_detached_entity_is_rejected() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();

    let err = article.update_to_collection().await.unwrap_err();

    assert!(matches!(err, EntityError::NotPersisted(_)));
    assert_eq!(articles.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn update_writes_the_whole_document_and_stamps_modification_time() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();
    article.set_info("Title", "draft").unwrap();
    article.add_to_collection().await.unwrap();
    assert_eq!(article.modification_time().unwrap(), None);

    article.set_info("Title", "final").unwrap();
    article.set_data("Words", 1200).unwrap();
    assert!(!article.check_is_same_as_collection());
    article.update_to_collection().await.unwrap();

    assert!(article.check_is_same_as_collection());
    assert!(article.modification_time().unwrap().is_some());

    let stored = articles
        .get_the_only_one_entity(Filter::eq("_id", article.get_id().unwrap()))
        .await
        .unwrap();
    assert_eq!(stored.get_str(RootSection::Info, "Title").unwrap(), "final");
    assert_eq!(stored.get_data("Words").unwrap(), &Bson::Int32(1200));
    assert_eq!(
        stored.creation_time().unwrap(),
        article.creation_time().unwrap()
    );
}

#[tokio::test]
async fn read_only_entities_refuse_every_mutation() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();
    article.set_info("Title", "frozen").unwrap();
    article.add_to_collection().await.unwrap();
    article.set_read_only();

    assert!(matches!(article.set_data("A", 1), Err(EntityError::ReadOnly(_))));
    assert!(matches!(article.set_info("Title", "x"), Err(EntityError::ReadOnly(_))));
    assert!(matches!(article.set_meta("State", "x"), Err(EntityError::ReadOnly(_))));
    assert!(matches!(article.replace_info(doc! {}), Err(EntityError::ReadOnly(_))));
    assert!(matches!(article.set_signature("sig"), Err(EntityError::ReadOnly(_))));
    assert!(matches!(
        article.update_to_collection().await,
        Err(EntityError::ReadOnly(_))
    ));

    assert_eq!(article.get_str(RootSection::Info, "Title").unwrap(), "frozen");
    assert!(article.is_read_only());
}

#[tokio::test]
async fn read_only_detached_entities_are_never_added() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();
    article.set_read_only();

    let err = article.add_to_collection().await.unwrap_err();

    assert!(matches!(err, EntityError::ReadOnly(_)));
    assert!(!article.check_is_in_collection());
    assert_eq!(articles.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn signature_is_written_once_and_persisted() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();
    article.set_signature("first").unwrap();

    let err = article.set_signature("second").unwrap_err();
    assert!(matches!(err, EntityError::DuplicateWrite(_)));
    assert_eq!(article.get_signature(), Some(&Bson::String("first".into())));

    article.add_to_collection().await.unwrap();
    assert!(articles.check_exists_signature("first").await.unwrap());
    assert!(!articles.check_exists_signature("second").await.unwrap());
}

#[tokio::test]
async fn duplicate_signature_insert_surfaces_as_duplicate_write() {
    let store = unique_signature_store().await;
    let articles = store.collection::<Article>().unwrap();

    let mut first = articles.create_entity().unwrap();
    first.set_signature("same").unwrap();
    first.add_to_collection().await.unwrap();

    let mut second = articles.create_entity().unwrap();
    second.set_signature("same").unwrap();
    let err = second.add_to_collection().await.unwrap_err();

    assert!(matches!(err, EntityError::DuplicateWrite(_)));
    assert!(!err.is_fatal());
    assert!(!second.check_is_in_collection());
    assert_eq!(articles.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn section_fields_round_trip() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();

    article.set_data("Body", "text").unwrap();
    article.set_info("Title", "T").unwrap();
    article.set_meta("State", "published").unwrap();
    article.set_name("Launch notes").unwrap();

    assert_eq!(article.get_data("Body").unwrap(), &Bson::String("text".into()));
    assert_eq!(article.get_info("Title").unwrap(), &Bson::String("T".into()));
    assert_eq!(article.get_state().unwrap(), &Bson::String("published".into()));
    assert_eq!(article.get_name().unwrap(), "Launch notes");
    assert_eq!(article.get_data_or("Missing", 0).unwrap(), Bson::Int32(0));
    assert!(matches!(
        article.get_meta("Missing"),
        Err(EntityError::FieldNotFound(field, section)) if field == "Missing" && section == "Meta"
    ));

    article.replace_data(doc! { "Only": true }).unwrap();
    assert_eq!(article.data(), &doc! { "Only": true });
}

#[tokio::test]
async fn json_view_carries_every_section() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let mut article = articles.create_entity().unwrap();
    article.set_info("Title", "T").unwrap();
    article.add_to_collection().await.unwrap();

    let json = article.to_json().unwrap();

    assert_eq!(json["Info"]["Title"], "T");
    assert_eq!(json["Meta"]["Type"], "Article");
    assert!(json.get("_id").is_some());
}
