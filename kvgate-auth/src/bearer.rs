//! Static bearer token verification

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use kvgate_core::GatewayError;
use thiserror::Error;
use tracing::warn;

/// Token used when `API_TOKEN` is not configured. Not a secret.
pub const DEFAULT_API_TOKEN: &str = "demo-token-123";

/// Errors during bearer verification
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingHeader,

    #[error("Invalid authentication scheme")]
    InvalidScheme,

    #[error("Invalid authentication token")]
    InvalidToken,
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        GatewayError::new(kvgate_core::ErrorCode::Unauthorized, err.to_string())
    }
}

/// Extract the credentials from an `Authorization: Bearer <token>` value
///
/// The scheme is matched case-insensitively; the credentials must be non-empty.
pub fn parse_bearer(value: &str) -> Result<&str, AuthError> {
    let (scheme, credentials) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidScheme)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidScheme);
    }

    let credentials = credentials.trim();
    if credentials.is_empty() {
        return Err(AuthError::InvalidScheme);
    }

    Ok(credentials)
}

/// The process-wide expected token
#[derive(Debug, Clone)]
pub struct BearerAuth {
    expected: String,
}

impl BearerAuth {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Whether the demo default token is in effect
    pub fn is_default(&self) -> bool {
        self.expected == DEFAULT_API_TOKEN
    }

    /// Compare a presented token with the expected one, returning it on match
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        if token != self.expected {
            return Err(AuthError::InvalidToken);
        }
        Ok(token.to_string())
    }

    /// Verify the `Authorization` header of a request
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidScheme)?;

        self.verify(parse_bearer(value)?)
    }
}

impl Default for BearerAuth {
    fn default() -> Self {
        Self::new(DEFAULT_API_TOKEN)
    }
}

/// Middleware rejecting requests without the expected bearer token
///
/// Rejections are 401 with `WWW-Authenticate: Bearer` and a JSON detail body.
pub async fn require_bearer(
    State(auth): State<Arc<BearerAuth>>,
    request: Request,
    next: Next,
) -> Response {
    match auth.verify_headers(request.headers()) {
        Ok(_) => next.run(request).await,
        Err(err) => {
            warn!(uri = %request.uri(), reason = %err, "Rejected bearer token");
            unauthorized_response(err)
        }
    }
}

fn unauthorized_response(err: AuthError) -> Response {
    let body = GatewayError::from(err).to_json();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    let headers = response.headers_mut();
    headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
