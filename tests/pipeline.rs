//! End-to-end pipeline tests over the in-memory engine: register models,
//! create indexes, index records, refresh, and search.

use std::sync::Arc;

use serde_json::json;

use search_bridge::bridge::{BindOptions, Bridge, MutationAction};
use search_bridge::engine::{MemoryEngine, SearchEngine};
use search_bridge::refs::MemoryRecords;
use search_bridge::schema::{Field, FieldKind, Projection, ProjectionField, Schema};

fn group_schema() -> Schema {
    let user = Schema::new()
        .field("first", Field::text())
        .field("last", Field::text());
    Schema::new()
        .field("group", Field::text())
        .field(
            "user",
            Field::array_of(FieldKind::Embedded { schema: user }).es_type("nested"),
        )
}

fn user_schema_with_projection() -> Schema {
    Schema::new()
        .field("first", Field::text())
        .field("last", Field::text())
        .field(
            "company",
            Field::reference("Company").projection(
                Projection::new()
                    .field("_id", ProjectionField::typed("text"))
                    .field("name", ProjectionField::typed("text"))
                    .field(
                        "city",
                        ProjectionField::shaped(
                            Projection::new()
                                .field("_id", ProjectionField::typed("text"))
                                .field("name", ProjectionField::typed("text"))
                                .field(
                                    "tags",
                                    ProjectionField::shaped(
                                        Projection::new()
                                            .field("value", ProjectionField::typed("text")),
                                    ),
                                ),
                        ),
                    ),
            ),
        )
}

#[tokio::test]
async fn nested_array_round_trip() {
    let engine = Arc::new(MemoryEngine::new());
    let mut bridge = Bridge::new(engine.clone());
    bridge
        .register("Group", group_schema(), BindOptions::default())
        .unwrap();

    bridge.create_index("Group", None).await.unwrap();
    let mapping = engine.index_body("groups").unwrap();
    assert_eq!(
        mapping["mappings"]["group"]["properties"]["user"]["type"],
        "nested"
    );

    let record = json!({
        "_id": "g1",
        "group": "fans",
        "user": [
            { "_id": "u1", "first": "John", "last": "Smith" },
            { "_id": "u2", "first": "Alice", "last": "White" }
        ]
    });
    let outcome = bridge.dispatch_index("Group", record).await.unwrap();
    assert_eq!(outcome.id, "g1");
    assert_eq!(outcome.action, MutationAction::Index);
    assert!(outcome.result.is_ok());

    bridge.refresh("Group").await.unwrap();
    let result = bridge
        .search("Group", json!({ "query": { "match_all": {} } }))
        .await
        .unwrap();
    assert_eq!(result["hits"]["total"], 1);
    assert_eq!(
        result["hits"]["hits"][0]["_source"],
        json!({
            "group": "fans",
            "user": [
                { "first": "John", "last": "Smith" },
                { "first": "Alice", "last": "White" }
            ]
        })
    );
}

#[tokio::test]
async fn populated_reference_chain_is_projected() {
    let engine = Arc::new(MemoryEngine::new());
    let mut bridge = Bridge::new(engine.clone());
    bridge
        .register("User", user_schema_with_projection(), BindOptions::default())
        .unwrap();
    bridge.create_index("User", None).await.unwrap();

    let record = json!({
        "_id": "u1",
        "first": "Maurice",
        "last": "Moss",
        "company": {
            "_id": "c1",
            "name": "Futuroscope",
            "city": {
                "_id": "ci1",
                "name": "Poitiers",
                "tags": [ { "value": "nice" }, { "value": "cool" } ]
            }
        }
    });
    bridge.index_record("User", &record).await.unwrap();

    let doc = engine.get_document("users", "user", "u1").await.unwrap();
    assert_eq!(
        doc.unwrap(),
        json!({
            "first": "Maurice",
            "last": "Moss",
            "company": {
                "_id": "c1",
                "name": "Futuroscope",
                "city": {
                    "_id": "ci1",
                    "name": "Poitiers",
                    "tags": [ { "value": "nice" }, { "value": "cool" } ]
                }
            }
        })
    );
}

#[tokio::test]
async fn unpopulated_reference_is_omitted() {
    let engine = Arc::new(MemoryEngine::new());
    let mut bridge = Bridge::new(engine.clone());
    bridge
        .register("User", user_schema_with_projection(), BindOptions::default())
        .unwrap();
    bridge.create_index("User", None).await.unwrap();

    let record = json!({ "_id": "u1", "first": "Maurice", "last": "Moss", "company": "c1" });
    bridge.index_record("User", &record).await.unwrap();

    let doc = engine.get_document("users", "user", "u1").await.unwrap();
    assert_eq!(doc.unwrap(), json!({ "first": "Maurice", "last": "Moss" }));
}

#[tokio::test]
async fn raw_reference_resolves_through_record_source() {
    let engine = Arc::new(MemoryEngine::new());
    let records = Arc::new(MemoryRecords::new());
    records.insert(
        "Company",
        "c1",
        json!({
            "_id": "c1",
            "name": "Futuroscope",
            "city": {
                "_id": "ci1",
                "name": "Poitiers",
                "tags": [ { "value": "nice" } ]
            }
        }),
    );

    let mut bridge = Bridge::new(engine.clone()).with_records(records);
    bridge
        .register("User", user_schema_with_projection(), BindOptions::default())
        .unwrap();

    let record = json!({ "_id": "u1", "first": "Maurice", "company": "c1" });
    bridge.index_record("User", &record).await.unwrap();

    let doc = engine.get_document("users", "user", "u1").await.unwrap();
    assert_eq!(
        doc.unwrap(),
        json!({
            "first": "Maurice",
            "company": {
                "_id": "c1",
                "name": "Futuroscope",
                "city": {
                    "_id": "ci1",
                    "name": "Poitiers",
                    "tags": [ { "value": "nice" } ]
                }
            }
        })
    );
}

#[tokio::test]
async fn recreate_index_reflects_latest_settings() {
    let engine = Arc::new(MemoryEngine::new());
    let mut bridge = Bridge::new(engine.clone());
    bridge
        .register("User", user_schema_with_projection(), BindOptions::default())
        .unwrap();

    bridge
        .create_index(
            "User",
            Some(json!({ "analysis": { "analyzer": { "old": { "tokenizer": "letter" } } } })),
        )
        .await
        .unwrap();
    bridge.delete_index("User").await.unwrap();
    bridge
        .create_index(
            "User",
            Some(json!({ "analysis": { "analyzer": { "new": { "tokenizer": "keyword" } } } })),
        )
        .await
        .unwrap();

    let body = engine.index_body("users").unwrap();
    let analyzers = body["settings"]["analysis"]["analyzer"].as_object().unwrap();
    assert!(analyzers.contains_key("new"));
    assert!(!analyzers.contains_key("old"));
}

#[tokio::test]
async fn update_replaces_and_remove_deletes() {
    let engine = Arc::new(MemoryEngine::new());
    let mut bridge = Bridge::new(engine.clone());
    bridge
        .register(
            "User",
            Schema::new()
                .field("name", Field::text())
                .field("age", Field::double()),
            BindOptions::default(),
        )
        .unwrap();
    bridge.create_index("User", None).await.unwrap();

    bridge
        .index_record("User", &json!({ "_id": "u1", "name": "jane", "age": 30 }))
        .await
        .unwrap();
    // An update is a full replace, never a merge.
    bridge
        .index_record("User", &json!({ "_id": "u1", "name": "janet" }))
        .await
        .unwrap();
    let doc = engine.get_document("users", "user", "u1").await.unwrap();
    assert_eq!(doc.unwrap(), json!({ "name": "janet" }));

    let outcome = bridge.dispatch_remove("User", "u1".to_string()).await.unwrap();
    assert_eq!(outcome.action, MutationAction::Remove);
    assert!(outcome.result.is_ok());
    assert!(engine
        .get_document("users", "user", "u1")
        .await
        .unwrap()
        .is_none());

    // Removing an already-absent record stays a success.
    bridge.remove_record("User", "u1").await.unwrap();
}
