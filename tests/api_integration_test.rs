//! Integration tests for the REST client against a mock backend.
//!
//! Covers the envelope contract, pagination, the one-shot 401
//! refresh-and-retry path, and the forced logout when the refresh
//! token is rejected.

use assistant_client::auth::AuthContext;
use assistant_client::models::DocumentSearch;
use assistant_client::{ApiClient, ApiError};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authed_context() -> AuthContext {
    let ctx = AuthContext::in_memory();
    ctx.set_tokens(
        "access-token".to_string(),
        Some("refresh-token".to_string()),
        Some(3600),
    );
    ctx
}

fn envelope(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": data,
        "timestamp": 1736956800
    })
}

#[tokio::test]
async fn test_get_conversation_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/c1"))
        .and(header("authorization", "Bearer access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "id": "c1",
            "title": "P99 investigation",
            "status": "active",
            "totalMessages": 4
        }))))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let conversation = client.get_conversation("c1").await.unwrap();
    assert_eq!(conversation.id, "c1");
    assert_eq!(conversation.title, "P99 investigation");
    assert_eq!(conversation.total_messages, 4);
}

#[tokio::test]
async fn test_error_envelope_maps_to_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "success": false,
            "message": "conversation not found",
            "errorCode": 40413,
            "timestamp": 0
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let err = client.get_conversation("missing").await.unwrap_err();
    match err {
        ApiError::Server {
            status,
            error_code,
            message,
        } => {
            assert_eq!(status, 404);
            assert_eq!(error_code, Some(40413));
            assert_eq!(message, "conversation not found");
        }
        other => panic!("expected Server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_success_envelope_without_data_is_missing_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "timestamp": 0
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let err = client.get_conversation("c1").await.unwrap_err();
    assert!(matches!(err, ApiError::MissingData { .. }));
}

#[tokio::test]
async fn test_paginated_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations"))
        .and(query_param("page", "2"))
        .and(query_param("pageSize", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "data": [
                {"id": "c11", "title": "one"},
                {"id": "c12", "title": "two"}
            ],
            "pagination": {"page": 2, "pageSize": 10, "total": 12, "totalPage": 2}
        }))))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let listing = client.list_conversations(2, 10).await.unwrap();
    assert_eq!(listing.data.len(), 2);
    assert_eq!(listing.pagination.total, 12);
    assert_eq!(listing.pagination.total_page, 2);
}

#[tokio::test]
async fn test_401_refreshes_and_retries_once() {
    let server = MockServer::start().await;

    // First call with the stale token is rejected
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .and(header("authorization", "Bearer access-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "message": "token expired",
            "errorCode": 40101,
            "timestamp": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({"refreshToken": "refresh-token"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "accessToken": "fresh-token",
            "refreshToken": "fresh-refresh",
            "expiresIn": 3600
        }))))
        .expect(1)
        .mount(&server)
        .await;

    // Retry with the refreshed token succeeds
    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "id": "u1",
            "username": "alice",
            "email": "a@example.com",
            "role": "user"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authed_context();
    let client = ApiClient::new(server.uri(), auth.clone());
    let user = client.profile().await.unwrap();
    assert_eq!(user.username, "alice");

    // The rotated pair is now stored
    assert_eq!(auth.access_token(), Some("fresh-token".to_string()));
    assert_eq!(auth.refresh_token(), Some("fresh-refresh".to_string()));
}

#[tokio::test]
async fn test_refresh_failure_clears_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "message": "token expired",
            "timestamp": 0
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "success": false,
            "message": "refresh token revoked",
            "timestamp": 0
        })))
        .mount(&server)
        .await;

    let auth = authed_context();
    let client = ApiClient::new(server.uri(), auth.clone());
    let err = client.profile().await.unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired(_)));

    // Forced logout: nothing left to retry with
    assert!(!auth.is_authenticated());
    assert!(auth.refresh_token().is_none());
}

#[tokio::test]
async fn test_login_stores_tokens_and_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(serde_json::json!({
            "username": "alice",
            "password": "secret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "expiresIn": 3600,
            "user": {
                "id": "u1",
                "username": "alice",
                "email": "a@example.com",
                "role": "user"
            }
        }))))
        .mount(&server)
        .await;

    let auth = AuthContext::in_memory();
    let client = ApiClient::new(server.uri(), auth.clone());
    let user = client.login("alice", "secret").await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(auth.access_token(), Some("a1".to_string()));
    assert_eq!(auth.credentials().username, Some("alice".to_string()));
}

#[tokio::test]
async fn test_logout_clears_credentials_even_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "success": false,
            "message": "internal error",
            "timestamp": 0
        })))
        .mount(&server)
        .await;

    let auth = authed_context();
    let client = ApiClient::new(server.uri(), auth.clone());
    assert!(client.logout().await.is_err());
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn test_send_message_returns_persisted_copy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations/c1/messages"))
        .and(body_json(serde_json::json!({"content": "what is p99 latency?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "id": "m7",
            "conversationId": "c1",
            "senderType": "user",
            "content": "what is p99 latency?",
            "status": "completed"
        }))))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let message = client.send_message("c1", "what is p99 latency?").await.unwrap();
    assert_eq!(message.id, "m7");
    assert_eq!(message.conversation_id, "c1");
}

#[tokio::test]
async fn test_document_search_builds_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/knowledge/documents"))
        .and(query_param("keyword", "cdn"))
        .and(query_param("page", "1"))
        .and(query_param("pageSize", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "data": [{"id": "d1", "categoryId": "cat1", "title": "CDN runbook"}],
            "pagination": {"page": 1, "pageSize": 20, "total": 1, "totalPage": 1}
        }))))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let search = DocumentSearch {
        keyword: Some("cdn".to_string()),
        ..Default::default()
    };
    let listing = client.search_documents(&search).await.unwrap();
    assert_eq!(listing.data[0].title, "CDN runbook");
}

#[tokio::test]
async fn test_toggle_tool() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tools/t1/toggle"))
        .and(body_json(serde_json::json!({"enabled": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(serde_json::json!({
            "id": "t1",
            "name": "grafana",
            "displayName": "Grafana",
            "toolType": "mcp",
            "config": {"protocol": "http", "endpoint": "http://mcp:8080"},
            "enabled": false
        }))))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), authed_context());
    let tool = client.toggle_tool("t1", false).await.unwrap();
    assert!(!tool.enabled);
    assert!(tool.config.as_mcp().is_some());
}
