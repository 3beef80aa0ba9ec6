//! Router integration tests
//!
//! Requests go through the full router (auth middleware, cache, handlers)
//! against the in-memory store or a store that always fails.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use kvgate::router::{create_router, AppState};
use kvgate_auth::BearerAuth;
use kvgate_keyvault::{CachedSecretStore, InMemorySecretStore, SecretStore, SecretsState};
use serde_json::{json, Value};
use support::FailingStore;
use tower::ServiceExt;

const TOKEN: &str = "demo-token-123";

fn app_with(store: Arc<dyn SecretStore>) -> Router {
    let cached = Arc::new(CachedSecretStore::new(store, 128));
    create_router(AppState::new(SecretsState::new(cached), BearerAuth::new(TOKEN)))
}

fn app() -> Router {
    app_with(Arc::new(InMemorySecretStore::new()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

#[tokio::test]
async fn test_example_scenario() {
    let app = app();

    let (status, _, created) = send(
        &app,
        Method::POST,
        "/secrets",
        None,
        Some(json!({"name": "db-pw", "value": "s3cr3t"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "db-pw");
    assert_eq!(created["value"], "s3cr3t");
    let version = created["version"].as_str().unwrap().to_string();
    assert!(!version.is_empty());

    let (status, _, fetched) = send(&app, Method::GET, "/secrets/db-pw", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, json!({"name": "db-pw", "value": "s3cr3t", "version": version}));

    let (status, headers, _) = send(&app, Method::GET, "/api/secrets", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");

    let (status, _, listed) = send(&app, Method::GET, "/api/secrets", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!({"secrets": ["db-pw"], "count": 1}));
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let (status, headers, body) =
        send(&app(), Method::GET, "/api/secrets", Some("not-the-token"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(body["detail"], "Invalid authentication token");
}

#[tokio::test]
async fn test_update_is_visible_after_cached_read() {
    let app = app();
    send(&app, Method::POST, "/secrets", None, Some(json!({"name": "x", "value": "old"}))).await;
    let (_, _, first) = send(&app, Method::GET, "/secrets/x", None, None).await;
    assert_eq!(first["value"], "old");

    let (_, _, updated) = send(
        &app,
        Method::POST,
        "/secrets",
        None,
        Some(json!({"name": "x", "value": "new"})),
    )
    .await;
    let (status, _, second) = send(&app, Method::GET, "/secrets/x", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["value"], "new");
    assert_eq!(second["version"], updated["version"]);
    assert_ne!(second["version"], first["version"]);
}

#[tokio::test]
async fn test_unknown_secret_is_404() {
    let (status, _, body) = send(&app(), Method::GET, "/secrets/does-not-exist", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Secret 'does-not-exist' not found");
}

#[tokio::test]
async fn test_empty_name_or_value_rejected() {
    let app = app();
    let (status, _, _) =
        send(&app, Method::POST, "/secrets", None, Some(json!({"name": "", "value": "v"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, _) =
        send(&app, Method::POST, "/secrets", None, Some(json!({"name": "n", "value": ""}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, _, listed) = send(&app, Method::GET, "/api/secrets", Some(TOKEN), None).await;
    assert_eq!(listed["count"], 0);
}

#[tokio::test]
async fn test_delete_then_get_is_404() {
    let app = app();
    send(&app, Method::POST, "/secrets", None, Some(json!({"name": "tmp", "value": "1"}))).await;
    send(&app, Method::GET, "/secrets/tmp", None, None).await;

    let (status, _, deleted) = send(&app, Method::DELETE, "/secrets/tmp", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["name"], "tmp");
    assert!(deleted["recovery_id"].is_string());
    assert!(deleted["scheduled_purge_date"].is_string());

    let (status, _, _) = send(&app, Method::GET, "/secrets/tmp", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, Method::DELETE, "/secrets/tmp", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_count_matches_length() {
    let app = app();
    for name in ["a", "b", "c"] {
        send(&app, Method::POST, "/secrets", None, Some(json!({"name": name, "value": "v"}))).await;
    }

    let (_, _, listed) = send(&app, Method::GET, "/api/secrets", Some(TOKEN), None).await;
    let secrets = listed["secrets"].as_array().unwrap();
    assert_eq!(listed["count"], secrets.len());
    assert_eq!(secrets.len(), 3);
}

#[tokio::test]
async fn test_provider_failures_are_500() {
    let app = app_with(Arc::new(FailingStore));

    let (status, _, body) = send(&app, Method::GET, "/secrets/any", None, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Failed to get secret: vault unreachable");

    let (status, _, body) =
        send(&app, Method::POST, "/secrets", None, Some(json!({"name": "n", "value": "v"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Failed to set secret: vault unreachable");

    let (status, _, body) = send(&app, Method::GET, "/api/secrets", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Failed to list secrets: vault unreachable");
}

#[tokio::test]
async fn test_health_reports_store_endpoint() {
    let (status, _, body) = send(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["keyvault"], "memory://local");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_control_panel_served() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}

mod support {
    use kvgate_core::DeletedSecret;
    use kvgate_keyvault::{SecretStore, SecretValue, StoreError};

    /// A store whose every call fails like an unreachable vault
    pub struct FailingStore;

    #[async_trait::async_trait]
    impl SecretStore for FailingStore {
        fn endpoint(&self) -> &str {
            "https://unreachable.vault.azure.net/"
        }

        async fn get(&self, _name: &str) -> Result<SecretValue, StoreError> {
            Err(StoreError::Provider("vault unreachable".to_string()))
        }

        async fn set(&self, _name: &str, _value: &str) -> Result<String, StoreError> {
            Err(StoreError::Provider("vault unreachable".to_string()))
        }

        async fn list(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Provider("vault unreachable".to_string()))
        }

        async fn delete(&self, _name: &str) -> Result<DeletedSecret, StoreError> {
            Err(StoreError::Provider("vault unreachable".to_string()))
        }
    }
}
