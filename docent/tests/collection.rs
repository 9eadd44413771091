mod common;

use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use docent::prelude::*;

use common::{Article, Draft, add_article, memory_store};

#[tokio::test]
async fn uninitialized_collections_fail_every_operation() {
    let store = memory_store();
    let drafts = store.collection::<Draft>().unwrap();

    assert!(drafts.name().is_none());
    assert!(matches!(
        drafts.create_entity(),
        Err(EntityError::UninitializedCollection(name)) if name == "Draft"
    ));
    assert!(matches!(
        drafts.count_all().await,
        Err(EntityError::UninitializedCollection(_))
    ));
    assert!(matches!(
        drafts.check_exists_signature("x").await,
        Err(EntityError::UninitializedCollection(_))
    ));
}

#[tokio::test]
async fn one_wrapper_per_collection_name() {
    let store = memory_store();

    let first = store.wrapper("Article", "Article").unwrap();
    let second = store.wrapper("Article", "Article").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let err = store.wrapper("Article", "Comment").unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn signature_lookup_distinguishes_none_one_and_many() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();

    assert!(matches!(
        articles.get_the_only_one_entity_by_signature("dup").await,
        Err(EntityError::NotFound(_, collection)) if collection == "Article"
    ));

    let mut first = articles.create_entity().unwrap();
    first.set_signature("dup").unwrap();
    first.add_to_collection().await.unwrap();

    let found = articles.get_the_only_one_entity_by_signature("dup").await.unwrap();
    assert_eq!(found.get_id().unwrap(), first.get_id().unwrap());

    let mut second = articles.create_entity().unwrap();
    second.set_signature("dup").unwrap();
    second.add_to_collection().await.unwrap();

    let err = articles
        .get_the_only_one_entity_by_signature("dup")
        .await
        .unwrap_err();
    assert!(matches!(err, EntityError::AmbiguousResult(_, _)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn existence_checks_follow_the_criterion() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    add_article(&articles, "a").await;
    add_article(&articles, "a").await;
    add_article(&articles, "b").await;

    let a = Filter::eq("Info.Title", "a");
    let b = Filter::eq("Info.Title", "b");
    let c = Filter::eq("Info.Title", "c");

    assert!(articles.check_exist_entities(a.clone()).await.unwrap());
    assert!(!articles.check_exist_entities(c.clone()).await.unwrap());
    assert!(articles.ensure_exist_entities(b.clone()).await.is_ok());
    assert!(matches!(
        articles.ensure_exist_entities(c.clone()).await,
        Err(EntityError::NotFound(_, _))
    ));

    assert!(articles.check_exists_only_one_entity(b.clone()).await.unwrap());
    assert!(!articles.check_exists_only_one_entity(a.clone()).await.unwrap());
    assert!(articles.ensure_exists_only_one_entity(b).await.is_ok());
    assert!(matches!(
        articles.ensure_exists_only_one_entity(a).await,
        Err(EntityError::AmbiguousResult(_, _))
    ));
    assert!(matches!(
        articles.ensure_exists_only_one_entity(c).await,
        Err(EntityError::NotFound(_, _))
    ));
}

#[tokio::test]
async fn malformed_ids_find_nothing() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    add_article(&articles, "a").await;

    assert!(!articles.check_exists_id("not-an-object-id").await.unwrap());
    assert!(!articles.check_exists_id(ObjectId::new()).await.unwrap());
}

#[tokio::test]
async fn counting_honors_the_window() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    for title in ["a", "b", "c", "d"] {
        add_article(&articles, title).await;
    }

    assert_eq!(articles.count_all().await.unwrap(), 4);
    assert_eq!(articles.count_entities(None, Some(1), None).await.unwrap(), 3);
    assert_eq!(articles.count_entities(None, Some(1), Some(2)).await.unwrap(), 2);
    assert_eq!(
        articles
            .count_entities(Some(Filter::gte("Info.Title", "c")), None, None)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn get_one_entity_takes_the_first_in_order() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    for title in ["b", "c", "a"] {
        add_article(&articles, title).await;
    }

    let everything = Filter::exists("Info.Title");
    let first = articles
        .get_one_entity(everything.clone(), vec![Sort::asc("Info.Title")], None, None)
        .await
        .unwrap();
    let second = articles
        .get_one_entity(everything.clone(), vec![Sort::asc("Info.Title")], Some(1), None)
        .await
        .unwrap();

    assert_eq!(first.get_str(RootSection::Info, "Title").unwrap(), "a");
    assert_eq!(second.get_str(RootSection::Info, "Title").unwrap(), "b");
    assert!(matches!(
        articles
            .get_one_entity(everything, vec![], Some(3), None)
            .await,
        Err(EntityError::NotFound(_, _))
    ));
}

#[tokio::test]
async fn multi_entities_are_loaded_lazily() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    for title in ["a", "b", "c"] {
        add_article(&articles, title).await;
    }

    let bulk = articles
        .get_multi_entities(
            Query::builder()
                .sort("Info.Title", SortDirection::Desc)
                .limit(2)
                .timeout(Some(Duration::from_secs(5)))
                .build(),
        )
        .unwrap();

    add_article(&articles, "d").await;

    let titles = bulk
        .fetch()
        .await
        .unwrap()
        .iter()
        .map(|article| article.get_str(RootSection::Info, "Title").unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(titles, ["d", "c"]);
    assert_eq!(bulk.count().await.unwrap(), 2);
    assert_eq!(bulk.ids().await.unwrap().len(), 2);
}

#[tokio::test]
async fn remove_multi_entities_deletes_matches_only() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    for title in ["keep", "drop", "drop"] {
        add_article(&articles, title).await;
    }

    let removed = articles
        .remove_multi_entities(Filter::eq("Info.Title", "drop"))
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(articles.count_all().await.unwrap(), 1);
}
