use bson::{Bson, doc};
use serde_json::json;

use doclink::prelude::*;

fn connector() -> Connector<MemoryEngine> {
    Connector::builder(MemoryEngine::new())
        .schema(ModelDefinitions::new().with_id("Product", "code"))
        .build()
}

async fn seed_people(connector: &Connector<MemoryEngine>) {
    connector
        .create_many(
            "Person",
            vec![
                doc! { "name": "a", "age": 20 },
                doc! { "name": "b", "age": 50 },
                doc! { "name": "c", "age": 30 },
                doc! { "name": "d", "age": 40 },
                doc! { "name": "e", "age": 10 },
            ],
        )
        .await
        .unwrap();
}

fn names(records: &[bson::Document]) -> Vec<&str> {
    records.iter().map(|r| r.get_str("name").unwrap()).collect()
}

#[tokio::test]
async fn create_count_remove_lifecycle() {
    let connector = connector();

    let id = connector.create("User", doc! { "name": "a" }).await.unwrap();
    assert_eq!(id, 1);
    assert_eq!(connector.count("User", Some(&doc! {})).await.unwrap(), 1);

    let removed = connector.destroy("User", id).await.unwrap();
    assert_eq!(removed, AffectedCount { count: 1 });
    assert!(connector.all("User", &FindFilter::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn created_records_read_back_with_identifier_and_no_internals() {
    let connector = connector();
    let record = doc! { "name": "a", "tags": ["x", "y"], "nested": { "n": 1 } };

    let id = connector.create("User", record.clone()).await.unwrap();
    let found = connector
        .all("User", &FindFilter::new().filter(doc! { "id": id }))
        .await
        .unwrap();

    let mut expected = record;
    expected.insert("id", id);
    assert_eq!(found, vec![expected]);
    assert!(!found[0].contains_key("$key"));
    assert!(!found[0].contains_key("meta"));
}

#[tokio::test]
async fn string_identifiers_are_coerced() {
    let connector = connector();
    connector.create("User", doc! { "name": "a" }).await.unwrap();

    let found = connector
        .all("User", &FindFilter::new().filter(doc! { "id": "1" }))
        .await
        .unwrap();
    let invalid = connector
        .all("User", &FindFilter::new().filter(doc! { "id": "4a" }))
        .await;

    assert_eq!(names(&found), vec!["a"]);
    assert!(matches!(invalid, Err(ConnectorError::InvalidIdentifier(_))));
}

#[tokio::test]
async fn custom_identifiers_are_unique() {
    let connector = connector();

    connector.create("Product", doc! { "code": "p-1", "name": "a" }).await.unwrap();
    let duplicate = connector.create("Product", doc! { "code": "p-1", "name": "b" }).await;

    assert!(matches!(
        duplicate,
        Err(ConnectorError::EngineFailure(EngineError::UniqueViolation { ref field, .. })) if field == "code"
    ));
    assert_eq!(connector.count("Product", None).await.unwrap(), 1);
    assert_eq!(
        connector.engine().describe_collection("Product").await.unwrap(),
        Some(CollectionOptions::unique(["code"]))
    );
}

#[tokio::test]
async fn order_skip_and_limit_apply_in_sequence() {
    let connector = connector();
    seed_people(&connector).await;

    let found = connector
        .all("Person", &FindFilter::new().order("age desc").skip(1).limit(2))
        .await
        .unwrap();

    assert_eq!(names(&found), vec!["d", "c"]);
}

#[tokio::test]
async fn ordering_by_identifier_follows_assigned_keys() {
    let connector = connector();
    seed_people(&connector).await;

    let found = connector
        .all("Person", &FindFilter::new().order("id desc").limit(3))
        .await
        .unwrap();

    assert_eq!(names(&found), vec!["e", "d", "c"]);
}

#[tokio::test]
async fn framework_find_filters_are_accepted() {
    let connector = connector();
    seed_people(&connector).await;

    let find: FindFilter = serde_json::from_value(json!({
        "where": { "or": [{ "age": { "gte": 40 } }, { "name": "a" }] },
        "order": ["age ASC"],
        "offset": 1,
    }))
    .unwrap();
    let found = connector.all("Person", &find).await.unwrap();

    assert_eq!(names(&found), vec!["d", "b"]);
}

#[tokio::test]
async fn empty_filter_matches_everything() {
    let connector = connector();
    seed_people(&connector).await;

    let all = connector
        .all("Person", &FindFilter::new().filter(doc! {}))
        .await
        .unwrap();

    assert_eq!(all.len(), 5);
    assert_eq!(connector.count("Person", None).await.unwrap(), 5);
}

#[tokio::test]
async fn range_and_set_operators_filter_records() {
    let connector = connector();
    seed_people(&connector).await;

    let between = connector
        .all("Person", &FindFilter::new().filter(doc! { "age": { "between": [20, 40] } }).order("age"))
        .await
        .unwrap();
    let excluded = connector
        .count("Person", Some(&doc! { "name": { "nin": ["a", "b"] } }))
        .await
        .unwrap();
    let by_ids = connector
        .count("Person", Some(&doc! { "id": { "inq": [1, "2", 9] } }))
        .await
        .unwrap();

    assert_eq!(names(&between), vec!["a", "c", "d"]);
    assert_eq!(excluded, 3);
    assert_eq!(by_ids, 2);
}

#[tokio::test]
async fn less_than_is_inclusive_unless_strict() {
    let inclusive = connector();
    let strict = Connector::builder(MemoryEngine::new())
        .less_than(LessThanMapping::Strict)
        .build();
    seed_people(&inclusive).await;
    seed_people(&strict).await;

    let filter = doc! { "age": { "lt": 30 } };

    assert_eq!(inclusive.count("Person", Some(&filter)).await.unwrap(), 3);
    assert_eq!(strict.count("Person", Some(&filter)).await.unwrap(), 2);
}

#[tokio::test]
async fn nor_filters_are_rejected() {
    let connector = connector();
    seed_people(&connector).await;

    let filter = doc! { "and": [{ "nor": [{ "name": "a" }] }] };

    let result = connector.destroy_all("Person", Some(&filter)).await;

    assert!(matches!(result, Err(ConnectorError::UnsupportedOperator(ref op)) if op == "nor"));
    assert_eq!(connector.count("Person", None).await.unwrap(), 5);
}

#[tokio::test]
async fn update_preserves_and_replace_discards_unlisted_fields() {
    let connector = connector();
    let updated_id = connector.create("User", doc! { "name": "a", "age": 1 }).await.unwrap();
    let replaced_id = connector.create("User", doc! { "name": "b", "age": 2 }).await.unwrap();

    let updated = connector
        .update("User", Some(&doc! { "id": updated_id }), doc! { "age": 10 })
        .await
        .unwrap();
    let replaced = connector
        .replace_by_id("User", replaced_id, doc! { "age": 20 })
        .await
        .unwrap();

    assert_eq!(updated, AffectedCount { count: 1 });
    assert_eq!(replaced, Some(doc! { "age": 20, "id": replaced_id }));

    let found = connector.all("User", &FindFilter::new().order("id")).await.unwrap();
    assert_eq!(found[0], doc! { "name": "a", "age": 10, "id": updated_id });
    assert_eq!(found[1], doc! { "age": 20, "id": replaced_id });
}

#[tokio::test]
async fn updates_ignore_protected_fields() {
    let connector = connector();
    let id = connector.create("User", doc! { "name": "a" }).await.unwrap();

    let updated = connector
        .update_attributes(
            "User",
            id,
            doc! { "id": 99, "meta": { "revision": 7 }, "$key": 42_i64, "$where": "x", "name": "b" },
        )
        .await
        .unwrap();

    assert_eq!(updated, Some(doc! { "name": "b", "id": id }));
    assert_eq!(connector.count("User", Some(&doc! { "id": 1 })).await.unwrap(), 1);
}

#[tokio::test]
async fn update_attributes_of_a_missing_record_is_none() {
    let connector = connector();
    connector.create("User", doc! { "name": "a" }).await.unwrap();

    assert_eq!(connector.update_attributes("User", 7, doc! { "name": "b" }).await.unwrap(), None);
    assert_eq!(connector.replace_by_id("User", 7, doc! { "name": "b" }).await.unwrap(), None);
    assert!(matches!(
        connector.replace_by_id("User", Bson::Double(1.5), doc! {}).await,
        Err(ConnectorError::InvalidIdentifier(_))
    ));
}

#[tokio::test]
async fn missing_collections_read_as_empty() {
    let connector = connector();

    assert_eq!(connector.count("Ghost", None).await.unwrap(), 0);
    assert!(connector.all("Ghost", &FindFilter::new()).await.unwrap().is_empty());
    assert_eq!(connector.destroy_all("Ghost", None).await.unwrap(), AffectedCount::default());
    assert_eq!(connector.update("Ghost", None, doc! { "x": 1 }).await.unwrap(), AffectedCount::default());
    assert_eq!(connector.replace_by_id("Ghost", 1, doc! {}).await.unwrap(), None);
    assert!(connector.engine().list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_collections_report_empty_for_malformed_filters() {
    let connector = connector();

    let nor = doc! { "nor": [{ "name": "a" }] };
    let bad_id = doc! { "id": "4a" };

    assert_eq!(connector.count("Ghost", Some(&nor)).await.unwrap(), 0);
    assert_eq!(connector.destroy_all("Ghost", Some(&bad_id)).await.unwrap(), AffectedCount::default());
    assert_eq!(connector.replace_by_id("Ghost", "4a", doc! {}).await.unwrap(), None);
    assert!(
        connector
            .all("Ghost", &FindFilter::new().filter(doc! { "id": "x" }))
            .await
            .unwrap()
            .is_empty()
    );

    connector.create("Ghost", doc! { "name": "a" }).await.unwrap();
    assert!(matches!(
        connector.count("Ghost", Some(&nor)).await,
        Err(ConnectorError::UnsupportedOperator(_))
    ));
}

#[tokio::test]
async fn destroy_all_reports_matched_count() {
    let connector = connector();
    seed_people(&connector).await;

    let removed = connector
        .destroy_all("Person", Some(&doc! { "age": { "gt": 25 } }))
        .await
        .unwrap();

    assert_eq!(removed, AffectedCount { count: 3 });
    assert_eq!(connector.count("Person", None).await.unwrap(), 2);
}

#[tokio::test]
async fn state_survives_disconnect_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("app.db");
    let settings = json!({
        "name": "db",
        "file": file.to_string_lossy(),
        "autosave": false,
        "models": { "Product": { "id": "code" } },
    });

    let first = doclink::initialize(settings.clone()).await.unwrap();
    first.create("Product", doc! { "code": "p-1" }).await.unwrap();
    first.create("User", doc! { "name": "a" }).await.unwrap();
    first.disconnect().await.unwrap();
    first.shutdown().await.unwrap();

    let second = doclink::initialize(settings).await.unwrap();

    assert_eq!(second.count("User", None).await.unwrap(), 1);
    assert_eq!(second.create("User", doc! { "name": "b" }).await.unwrap(), 2);
    assert!(matches!(
        second.create("Product", doc! { "code": "p-1" }).await,
        Err(ConnectorError::EngineFailure(EngineError::UniqueViolation { .. }))
    ));
    second.shutdown().await.unwrap();
}
