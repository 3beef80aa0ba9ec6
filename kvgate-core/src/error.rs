//! Gateway error taxonomy and formatting

use serde::Serialize;
use thiserror::Error;

/// Error codes surfaced by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    ProviderError,
    ConfigError,
    ValidationError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Unauthorized => "Unauthorized",
            Self::ProviderError => "ProviderError",
            Self::ConfigError => "ConfigError",
            Self::ValidationError => "ValidationError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Unauthorized => 401,
            Self::ValidationError => 422,
            Self::ProviderError | Self::ConfigError => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned across the gateway boundary
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Secret '{}' not found", name))
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Invalid authentication token")
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Prefix the message with the operation that failed, e.g.
    /// `Failed to set secret: <cause>`.
    pub fn context(mut self, operation: &str) -> Self {
        self.message = format!("{}: {}", operation, self.message);
        self
    }

    /// Format as the JSON error body returned to HTTP clients
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            detail: &'a str,
        }

        serde_json::to_string(&JsonError {
            detail: &self.message,
        })
        .unwrap_or_else(|_| format!(r#"{{"detail":"{}"}}"#, self.code.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::ProviderError.http_status(), 500);
        assert_eq!(ErrorCode::ConfigError.http_status(), 500);
        assert_eq!(ErrorCode::ValidationError.http_status(), 422);
    }

    #[test]
    fn test_error_json_format() {
        let error = GatewayError::not_found("db-pw");

        let json: serde_json::Value = serde_json::from_str(&error.to_json()).unwrap();
        assert_eq!(json["detail"], "Secret 'db-pw' not found");
    }

    #[test]
    fn test_context_prefixes_message() {
        let error = GatewayError::provider("connection refused").context("Failed to list secrets");
        assert_eq!(error.message, "Failed to list secrets: connection refused");
        assert_eq!(error.code, ErrorCode::ProviderError);
    }

    #[test]
    fn test_json_escapes_quotes() {
        let error = GatewayError::provider(r#"bad "quote""#);
        let json: serde_json::Value = serde_json::from_str(&error.to_json()).unwrap();
        assert_eq!(json["detail"], r#"bad "quote""#);
    }
}
