mod common;

use bson::{Bson, oid::ObjectId};
use docent::prelude::*;

use common::{Article, add_article, add_user, memory_store};

#[tokio::test]
async fn one_reference_defaults_to_the_target_kind() {
    let store = memory_store();
    let users = UserCollection::new(&store).unwrap();
    let articles = store.collection::<Article>().unwrap();
    let author = add_user(&users, "alice").await;

    let mut article = articles.create_entity().unwrap();
    article.build_one_reference(&author, None, true).unwrap();
    article.build_one_reference(&author, Some("Editor"), false).unwrap();

    let author_id = Bson::ObjectId(author.get_id().unwrap());
    assert_eq!(article.get_reference("UserId").unwrap(), &author_id);
    assert_eq!(article.get_reference("Editor").unwrap(), &author_id);
}

#[tokio::test]
async fn one_reference_conflicts_only_on_a_different_target() {
    let store = memory_store();
    let users = UserCollection::new(&store).unwrap();
    let articles = store.collection::<Article>().unwrap();
    let alice = add_user(&users, "alice").await;
    let bob = add_user(&users, "bob").await;

    let mut article = articles.create_entity().unwrap();
    article.build_one_reference(&alice, None, true).unwrap();
    article.build_one_reference(&alice, None, true).unwrap();

    let err = article.build_one_reference(&bob, None, true).unwrap_err();
    assert!(matches!(err, EntityError::ReferenceConflict(name, _, _) if name == "UserId"));

    article.build_one_reference(&bob, None, false).unwrap();
    assert_eq!(
        article.get_reference("UserId").unwrap(),
        &Bson::ObjectId(bob.get_id().unwrap())
    );
}

#[tokio::test]
async fn references_need_a_persisted_target() {
    let store = memory_store();
    let users = UserCollection::new(&store).unwrap();
    let articles = store.collection::<Article>().unwrap();
    let ghost = users.create_entity().unwrap();

    let mut article = articles.create_entity().unwrap();

    assert!(matches!(
        article.build_one_reference(&ghost, None, false),
        Err(EntityError::NotPersisted(_))
    ));
    assert!(matches!(
        article.build_multi_reference(&ghost, None, false),
        Err(EntityError::NotPersisted(_))
    ));
    assert!(!article.has_reference("UserId"));
}

#[tokio::test]
async fn multi_reference_appends_and_skips_duplicates_on_request() {
    let store = memory_store();
    let users = UserCollection::new(&store).unwrap();
    let articles = store.collection::<Article>().unwrap();
    let alice = add_user(&users, "alice").await;
    let bob = add_user(&users, "bob").await;

    let mut article = articles.create_entity().unwrap();
    article.build_multi_reference(&alice, None, true).unwrap();
    article.build_multi_reference(&bob, None, true).unwrap();
    article.build_multi_reference(&alice, None, true).unwrap();

    let ids = article.get_reference("UserIdList").unwrap().as_array().unwrap();
    assert_eq!(ids.len(), 2);

    article.build_multi_reference(&alice, None, false).unwrap();
    let ids = article.get_reference("UserIdList").unwrap().as_array().unwrap();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn multi_reference_over_a_scalar_is_an_invariant_violation() {
    let store = memory_store();
    let users = UserCollection::new(&store).unwrap();
    let articles = store.collection::<Article>().unwrap();
    let alice = add_user(&users, "alice").await;

    let mut article = articles.create_entity().unwrap();
    article.set_reference("Readers", "not a list").unwrap();

    let err = article
        .build_multi_reference(&alice, Some("Readers"), false)
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn bulk_by_multi_reference_keeps_list_order() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let first = add_article(&articles, "first").await;
    let second = add_article(&articles, "second").await;
    let third = add_article(&articles, "third").await;

    let mut digest = articles.create_entity().unwrap();
    for target in [&third, &first, &second] {
        digest
            .build_multi_reference(target, Some("Items"), false)
            .unwrap();
    }
    digest.add_to_collection().await.unwrap();

    let titles = |found: Vec<Article>| {
        found
            .iter()
            .map(|article| article.get_str(RootSection::Info, "Title").unwrap().to_string())
            .collect::<Vec<_>>()
    };

    let all = digest
        .get_bulk_by_multi_reference("Items", &articles, None)
        .unwrap();
    assert_eq!(titles(all.fetch().await.unwrap()), ["third", "first", "second"]);
    assert_eq!(all.count().await.unwrap(), 3);

    let limited = digest
        .get_bulk_by_multi_reference("Items", &articles, Some(2))
        .unwrap();
    assert_eq!(titles(limited.fetch().await.unwrap()), ["third", "first"]);
}

#[tokio::test]
async fn bulk_by_id_list_skips_ids_that_are_gone() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let kept = add_article(&articles, "kept").await;

    let bulk = Entity::get_bulk_by_id_list(
        vec![ObjectId::new(), kept.get_id().unwrap()],
        &articles,
        None,
    )
    .unwrap();

    let found = bulk.fetch().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_id().unwrap(), kept.get_id().unwrap());
}

#[tokio::test]
async fn repeated_references_agree_across_count_ids_and_fetch() {
    let store = memory_store();
    let articles = store.collection::<Article>().unwrap();
    let target = add_article(&articles, "target").await;

    let mut digest = articles.create_entity().unwrap();
    digest.build_multi_reference(&target, None, false).unwrap();
    digest.build_multi_reference(&target, None, false).unwrap();
    digest
        .set_reference(
            "Stale",
            vec![Bson::ObjectId(ObjectId::new()), Bson::ObjectId(target.get_id().unwrap())],
        )
        .unwrap();

    let repeated = digest
        .get_bulk_by_multi_reference("ArticleIdList", &articles, None)
        .unwrap();
    assert_eq!(repeated.count().await.unwrap(), 2);
    assert_eq!(repeated.ids().await.unwrap().len(), 2);
    assert_eq!(repeated.fetch().await.unwrap().len(), 2);

    let stale = digest
        .get_bulk_by_multi_reference("Stale", &articles, None)
        .unwrap();
    assert_eq!(stale.count().await.unwrap(), 1);
    assert_eq!(stale.ids().await.unwrap(), vec![target.get_id().unwrap()]);
    assert_eq!(stale.fetch().await.unwrap().len(), 1);
}
