//! Graph store client integration tests with mock server

use serde_json::json;
use shark_fin::access::{AccessDecision, AccessRequest, Rule, SharkFin};
use shark_fin::config::{StoreConfig, StoreToken, load_config_from_str};
use shark_fin::error::StoreError;
use shark_fin::store::{GraphStore, HttpGraphStore, RelationMember, RelationUpdate};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test client pointing to mock server
fn create_test_store(mock_server: &MockServer, token: Option<&str>) -> HttpGraphStore {
    let config = StoreConfig {
        url: mock_server.uri(),
        token: token.map(StoreToken::new),
        timeout_secs: 1,
        verify_ssl: true,
    };
    HttpGraphStore::new(&config).unwrap()
}

#[tokio::test]
async fn test_relation_members_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_json(json!({
            "_id": "user:u1",
            "relation": "blocked",
            "withScores": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "node:s1": 1,
            "node:s2.c4": "1"
        })))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, Some("test-token"));
    let members = store.relation_members("user:u1", "blocked").await.unwrap();

    assert_eq!(members.len(), 2);
    assert_eq!(members["node:s1"], 1);
    assert_eq!(members["node:s2.c4"], 1);
}

#[tokio::test]
async fn test_relation_score_with_missing_member() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/relation_score"))
        .and(body_json(json!({
            "_id": "user:u1",
            "relation": "_members",
            "items": ["node:t1", "node:t2"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "node:t1": "2",
            "node:t2": null
        })))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let scores = store
        .relation_score(
            "user:u1",
            "_members",
            &["node:t1".to_string(), "node:t2".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(scores["node:t1"], Some(2));
    assert_eq!(scores["node:t2"], None);
}

#[tokio::test]
async fn test_update_relations_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/update_relations"))
        .and(body_json(json!({
            "_id": "user:u1",
            "add": {"_members": ["node:t1~-1:!"]},
            "remove": {"blocked": ["node:s1"]},
            "incrBy": {"visits": ["node:t1~1:"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let update = RelationUpdate::new()
        .add("_members", RelationMember::persistent("node:t1", -1))
        .remove("blocked", "node:s1")
        .incr_by("visits", RelationMember::new("node:t1", 1));

    store.update_relation("user:u1", &update).await.unwrap();
}

#[tokio::test]
async fn test_empty_update_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    store
        .update_relation("user:u1", &RelationUpdate::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unauthorized_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "401 Unauthorized"
        })))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, Some("invalid-token"));
    let result = store.relation_members("user:u1", "blocked").await;

    assert!(matches!(result, Err(StoreError::Unauthorized)));
}

#[tokio::test]
async fn test_not_found_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/relation_score"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let result = store
        .relation_score("user:u1", "_members", &["node:t1".to_string()])
        .await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let result = store.relation_members("user:u1", "blocked").await;

    match result {
        Err(StoreError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_service_unavailable_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let result = store.relation_members("user:u1", "blocked").await;

    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_non_numeric_score_is_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "node:s1": "lots"
        })))
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let result = store.relation_members("user:u1", "blocked").await;

    assert!(matches!(result, Err(StoreError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let store = create_test_store(&mock_server, None);
    let result = store.relation_members("user:u1", "blocked").await;

    assert!(matches!(result, Err(StoreError::Timeout { timeout_secs: 1 })));
}

// =============================================================================
// Engine over the HTTP store
// =============================================================================

const ENGINE_CONFIG: &str = r#"
[access.actions]
read = 1
write = 2
admin = 3

[access.layers.topic._default]
anyone_can = "read"
owner_can = "write"
"#;

fn create_engine(mock_server: &MockServer) -> SharkFin {
    let config = load_config_from_str(ENGINE_CONFIG).unwrap();
    let store = Arc::new(create_test_store(mock_server, Some("test-token")));
    SharkFin::from_config(&config.access, store).unwrap()
}

#[tokio::test]
async fn test_engine_direct_grant_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/call/relation_score"))
        .and(body_json(json!({
            "_id": "user:u1",
            "relation": "_members",
            "items": ["node:t1"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"node:t1": 3})))
        .mount(&mock_server)
        .await;

    let engine = create_engine(&mock_server);
    let decision = engine
        .decide(&AccessRequest::new("u1", "admin").layer("topic").node("s1.t1"))
        .await
        .unwrap();

    assert_eq!(decision, AccessDecision::Granted(Rule::Direct));
}

#[tokio::test]
async fn test_engine_block_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"node:s1": 1})))
        .mount(&mock_server)
        .await;

    // The block settles the decision before any direct lookup
    Mock::given(method("POST"))
        .and(path("/call/relation_score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let engine = create_engine(&mock_server);
    let request = AccessRequest::new("u1", "read")
        .layer("topic")
        .node("s1.t1")
        .owner(true);

    assert!(!engine.is_granted(&request).await.unwrap());
}

#[tokio::test]
async fn test_engine_grant_writes_member() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/call/update_relations"))
        .and(body_json(json!({
            "_id": "user:u1",
            "add": {"_members": ["node:t1~2:!"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let engine = create_engine(&mock_server);
    engine.add_direct_access("u1", "t1", "write").await.unwrap();
}

#[tokio::test]
async fn test_engine_store_outage_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let engine = create_engine(&mock_server);
    let request = AccessRequest::new("u1", "read").layer("topic").node("t1");

    assert!(matches!(
        engine.is_granted(&request).await,
        Err(StoreError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_engine_direct_read_failure_is_error() {
    let mock_server = MockServer::start().await;

    // Block read succeeds with no blocks
    Mock::given(method("POST"))
        .and(path("/call/nav_relation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/call/relation_score"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let engine = create_engine(&mock_server);
    // anyone_can is read, so write falls through to the direct lookup
    let request = AccessRequest::new("u1", "write").layer("topic").node("t1");

    match engine.decide(&request).await {
        Err(StoreError::Unavailable(message)) => assert_eq!(message, "down"),
        other => panic!("Expected Unavailable error, got {other:?}"),
    }
}
