use httpmock::Method::{DELETE, GET, PATCH, POST};
use httpmock::MockServer;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::firestore::models::{Direction, FieldOperator, Value, ValueType};
use crate::firestore::query::Query;
use crate::firestore::{value, FirebaseFirestore};
use crate::{FirebaseApp, FirebaseConfig};

const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct User {
    name: String,
    age: i32,
}

fn test_db(server: &MockServer) -> FirebaseFirestore {
    let app = FirebaseApp::new(FirebaseConfig {
        api_key: "test-key".to_string(),
        project_id: "test-project".to_string(),
        firestore_url: Some(server.url(DOCS)),
        identity_url: None,
    });
    app.firestore()
}

#[tokio::test]
async fn get_document_deserializes_fields() {
    let server = MockServer::start();
    let db = test_db(&server);

    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("{}/users/alice", DOCS));
        then.status(200).json_body(json!({
            "name": "projects/test-project/databases/(default)/documents/users/alice",
            "fields": {
                "name": { "stringValue": "Alice" },
                "age": { "integerValue": "30" }
            },
            "createTime": "2021-01-01T00:00:00Z",
            "updateTime": "2021-01-01T00:00:00Z"
        }));
    });

    let user: Option<User> = db.doc("users/alice").get().await.unwrap();
    assert_eq!(
        user,
        Some(User {
            name: "Alice".to_string(),
            age: 30
        })
    );
    mock.assert();
}

#[tokio::test]
async fn get_missing_document_returns_none() {
    let server = MockServer::start();
    let db = test_db(&server);

    server.mock(|when, then| {
        when.method(GET).path(format!("{}/users/ghost", DOCS));
        then.status(404).json_body(json!({
            "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
        }));
    });

    let user: Option<User> = db.doc("users/ghost").get().await.unwrap();
    assert_eq!(user, None);
}

#[tokio::test]
async fn add_document_returns_assigned_id() {
    let server = MockServer::start();
    let db = test_db(&server);

    let mock = server.mock(|when, then| {
        when.method(POST).path(format!("{}/users", DOCS));
        then.status(200).json_body(json!({
            "name": "projects/test-project/databases/(default)/documents/users/generated123",
            "fields": {}
        }));
    });

    let doc = db
        .collection("users")
        .add(&User {
            name: "Bob".to_string(),
            age: 41,
        })
        .await
        .unwrap();
    assert_eq!(doc.id(), "generated123");
    mock.assert();
}

#[tokio::test]
async fn update_sends_field_mask() {
    let server = MockServer::start();
    let db = test_db(&server);

    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{}/users/alice", DOCS))
            .query_param("updateMask.fieldPaths", "age");
        then.status(200).json_body(json!({
            "name": "projects/test-project/databases/(default)/documents/users/alice",
            "fields": {}
        }));
    });

    db.collection("users")
        .doc("alice")
        .update(&json!({ "age": 31 }), Some(vec!["age".to_string()]))
        .await
        .unwrap();
    mock.assert();
}

#[tokio::test]
async fn delete_document() {
    let server = MockServer::start();
    let db = test_db(&server);

    let mock = server.mock(|when, then| {
        when.method(DELETE).path(format!("{}/users/alice", DOCS));
        then.status(200).json_body(json!({}));
    });

    db.collection("users").doc("alice").delete().await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn query_collects_documents_in_response_order() {
    let server = MockServer::start();
    let db = test_db(&server);

    let mock = server.mock(|when, then| {
        when.method(POST).path(format!("{}:runQuery", DOCS));
        then.status(200).json_body(json!([
            { "document": {
                "name": "projects/test-project/databases/(default)/documents/posts/p1",
                "fields": { "title": { "stringValue": "first" } }
            }},
            { "document": {
                "name": "projects/test-project/databases/(default)/documents/posts/p2",
                "fields": { "title": { "stringValue": "second" } }
            }},
            { "readTime": "2021-01-01T00:00:00Z" }
        ]));
    });

    let snapshot = db.collection("posts").query().get().await.unwrap();
    assert_eq!(snapshot.size(), 2);
    assert_eq!(snapshot.documents()[0].id(), "p1");
    assert_eq!(snapshot.documents()[1].id(), "p2");
    mock.assert();
}

#[tokio::test]
async fn nested_collection_queries_under_its_parent() {
    let server = MockServer::start();
    let db = test_db(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{}/tenants/acme:runQuery", DOCS));
        then.status(200).json_body(json!([]));
    });

    let snapshot = db.collection("tenants/acme/users").query().get().await.unwrap();
    assert!(snapshot.empty());
    mock.assert();
}

#[test]
fn filters_combine_into_a_composite_and() {
    let query = Query::new("users")
        .where_filter("age", FieldOperator::GreaterThan, 21)
        .unwrap()
        .where_filter("active", FieldOperator::Equal, true)
        .unwrap()
        .order_by("age", Direction::Descending)
        .limit(5);

    let body = serde_json::to_value(&query.query).unwrap();
    assert_eq!(body["where"]["compositeFilter"]["op"], "AND");
    assert_eq!(
        body["where"]["compositeFilter"]["filters"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
    assert_eq!(body["orderBy"][0]["direction"], "DESCENDING");
    assert_eq!(body["limit"], 5);
}

#[test]
fn single_filter_stays_a_field_filter() {
    let query = Query::new("users")
        .where_filter("age", FieldOperator::GreaterThanOrEqual, 18)
        .unwrap();

    let body = serde_json::to_value(&query.query).unwrap();
    assert_eq!(body["where"]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
    assert_eq!(body["where"]["fieldFilter"]["field"]["fieldPath"], "age");
}

#[test]
fn values_survive_a_conversion_roundtrip() {
    let original = json!({
        "s": "x",
        "i": 3,
        "f": 1.5,
        "b": true,
        "n": null,
        "arr": [1, "two"],
        "nested": { "k": "v" }
    });
    let fields = value::serializable_to_fields(&original).unwrap();
    let back = value::fields_to_json(fields).unwrap();
    assert_eq!(back, original);
}

#[test]
fn timestamp_values_come_back_as_strings() {
    let ts = Value {
        value_type: ValueType::TimestampValue("2021-05-01T10:00:00Z".to_string()),
    };
    assert_eq!(
        value::value_to_json(ts).unwrap(),
        json!("2021-05-01T10:00:00Z")
    );
}
