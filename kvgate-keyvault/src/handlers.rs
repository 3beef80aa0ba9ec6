//! HTTP handlers for the secret routes

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use kvgate_core::{validate_name, validate_value, ErrorCode, GatewayError, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::store::SecretStore;

/// Shared state for the secret handlers
pub struct SecretsState {
    pub store: Arc<dyn SecretStore>,
}

impl SecretsState {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }
}

// === Request/Response types ===

#[derive(Debug, Deserialize)]
struct CreateSecretRequest {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SecretListResponse {
    secrets: Vec<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    keyvault: &'a str,
    version: &'static str,
}

// === Handlers ===

/// `GET /health`
pub async fn health(State(state): State<Arc<SecretsState>>) -> Response {
    let response = HealthResponse {
        status: "healthy",
        keyvault: state.store.endpoint(),
        version: env!("CARGO_PKG_VERSION"),
    };
    json_response(StatusCode::OK, &response)
}

/// `POST /secrets`: create or update a secret
pub async fn create_secret(State(state): State<Arc<SecretsState>>, body: Bytes) -> Response {
    let req: CreateSecretRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(GatewayError::validation(e.to_string())),
    };

    if let Err(e) = validate_name(&req.name).and_then(|()| validate_value(&req.value)) {
        return error_response(e);
    }

    match state.store.set(&req.name, &req.value).await {
        Ok(version) => {
            info!(name = %req.name, "Secret created");
            let response = Secret {
                name: req.name,
                value: req.value,
                version: Some(version),
            };
            json_response(StatusCode::CREATED, &response)
        }
        Err(e) => {
            error!(name = %req.name, error = %e, "Failed to set secret");
            error_response(GatewayError::from(e).context("Failed to set secret"))
        }
    }
}

/// `GET /secrets/{name}`
pub async fn get_secret(
    State(state): State<Arc<SecretsState>>,
    Path(name): Path<String>,
) -> Response {
    // A name the vault would reject cannot exist
    if validate_name(&name).is_err() {
        return error_response(GatewayError::not_found(&name));
    }

    match state.store.get(&name).await {
        Ok(secret) => {
            info!(name = %name, "Secret retrieved");
            let response = Secret {
                name,
                value: secret.value,
                version: Some(secret.version),
            };
            json_response(StatusCode::OK, &response)
        }
        Err(e) => {
            let err = GatewayError::from(e);
            if err.code == ErrorCode::NotFound {
                return error_response(err);
            }
            error!(name = %name, error = %err, "Failed to get secret");
            error_response(err.context("Failed to get secret"))
        }
    }
}

/// `DELETE /secrets/{name}`: soft delete
pub async fn delete_secret(
    State(state): State<Arc<SecretsState>>,
    Path(name): Path<String>,
) -> Response {
    if validate_name(&name).is_err() {
        return error_response(GatewayError::not_found(&name));
    }

    match state.store.delete(&name).await {
        Ok(deleted) => {
            info!(name = %name, "Secret deleted");
            json_response(StatusCode::OK, &deleted)
        }
        Err(e) => {
            let err = GatewayError::from(e);
            if err.code == ErrorCode::NotFound {
                return error_response(err);
            }
            error!(name = %name, error = %err, "Failed to delete secret");
            error_response(err.context("Failed to delete secret"))
        }
    }
}

/// `GET /api/secrets`: names only, behind the bearer gate
pub async fn list_secrets(State(state): State<Arc<SecretsState>>) -> Response {
    match state.store.list().await {
        Ok(secrets) => {
            info!(count = secrets.len(), "Listed secrets");
            let response = SecretListResponse {
                count: secrets.len(),
                secrets,
            };
            json_response(StatusCode::OK, &response)
        }
        Err(e) => {
            error!(error = %e, "Failed to list secrets");
            error_response(GatewayError::from(e).context("Failed to list secrets"))
        }
    }
}

// === Helpers ===

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_string(body) {
        Ok(json) => (status, [(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(e) => error_response(GatewayError::provider(e.to_string())),
    }
}

/// Translate a gateway error into its HTTP status and JSON body
pub fn error_response(err: GatewayError) -> Response {
    let status = StatusCode::from_u16(err.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        err.to_json(),
    )
        .into_response();

    if err.code == ErrorCode::Unauthorized {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}
