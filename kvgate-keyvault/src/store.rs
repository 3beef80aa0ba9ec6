//! Secret store abstraction

use async_trait::async_trait;
use kvgate_core::{DeletedSecret, GatewayError};
use thiserror::Error;

use crate::credential::CredentialError;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Invalid vault endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Provider(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => GatewayError::not_found(&name),
            StoreError::InvalidEndpoint(_) => GatewayError::config(err.to_string()),
            other => GatewayError::provider(other.to_string()),
        }
    }
}

/// Current value of a secret together with the version that holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub value: String,
    pub version: String,
}

/// A backend holding named secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Endpoint reported by the health check
    fn endpoint(&self) -> &str;

    /// Fetch the current value of a secret
    async fn get(&self, name: &str) -> Result<SecretValue, StoreError>;

    /// Write a new value, returning the version the store assigned
    async fn set(&self, name: &str, value: &str) -> Result<String, StoreError>;

    /// Names of all live secrets (values are never listed)
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Soft-delete a secret; it stays recoverable until its purge date
    async fn delete(&self, name: &str) -> Result<DeletedSecret, StoreError>;
}
