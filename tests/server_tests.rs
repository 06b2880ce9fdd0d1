//! HTTP surface tests that need no database.
//!
//! The pool is opened lazily, so the router can be exercised with an
//! unreachable database as long as a request never touches storage.

use axum_test::TestServer;
use murkylook::config::AppConfig;
use murkylook::server::{AppState, build_router};
use murkylook::storage::Database;
use serde_json::{Value, json};

fn offline_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.host = "127.0.0.1".into();
    config.database.port = 1;
    config.database.connect_timeout_secs = 1;
    config
}

fn make_server(config: &AppConfig) -> TestServer {
    let db = Database::connect(&config.database).unwrap();
    let state = AppState::new(db, config);
    TestServer::new(build_router(state, &config.server))
}

async fn post_query(server: &TestServer, query: &str) -> Value {
    server
        .post("/graphql")
        .json(&json!({ "query": query }))
        .await
        .json()
}

#[tokio::test]
async fn test_graphiql_is_served_on_get() {
    let server = make_server(&offline_config());

    let response = server.get("/graphql").await;
    response.assert_status_ok();
    assert!(response.text().to_lowercase().contains("graphiql"));
}

#[tokio::test]
async fn test_graphql_path_is_configurable() {
    let mut config = offline_config();
    config.server.graphql_path = "/api/graphql".into();
    let server = make_server(&config);

    server.get("/api/graphql").await.assert_status_ok();
    server.get("/graphql").await.assert_status_not_found();
}

#[tokio::test]
async fn test_typename_needs_no_storage() {
    let server = make_server(&offline_config());

    let body = post_query(&server, "{ __typename }").await;
    assert_eq!(body["data"]["__typename"], "QueryRoot");
}

#[tokio::test]
async fn test_unknown_field_is_a_graphql_error() {
    let server = make_server(&offline_config());

    let body = post_query(&server, "{ planets { name } }").await;
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("planets"));
}

#[tokio::test]
async fn test_excessive_depth_is_rejected() {
    let server = make_server(&offline_config());

    let mut selection = "name".to_string();
    for _ in 0..8 {
        selection = format!("continent {{ countries {{ {} }} }}", selection);
    }
    let query = format!("{{ countries {{ items {{ {} }} }} }}", selection);
    let body = post_query(&server, &query).await;
    assert!(body["data"].is_null());
    assert!(body["errors"][0]["message"].as_str().unwrap().contains("deep"));
}

#[tokio::test]
async fn test_invalid_input_fails_before_storage() {
    let server = make_server(&offline_config());

    let body = post_query(
        &server,
        "mutation { createVisit(input: { userId: 1, destinationId: 1, rating: 9 }) { id } }",
    )
    .await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let server = make_server(&offline_config());

    let response = server.get("/health").expect_failure().await;
    let body: Value = response.json();
    assert!(body["code"].is_string());
}
