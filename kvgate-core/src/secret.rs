//! Secret model and input validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Longest secret name the vault accepts
pub const MAX_NAME_LEN: usize = 127;

/// A named secret value as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub value: String,
    /// Version assigned by the store on write; opaque to the gateway
    pub version: Option<String>,
}

/// Result of a soft delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedSecret {
    pub name: String,
    /// Identifier for recovering the secret before it is purged
    pub recovery_id: Option<String>,
    pub scheduled_purge_date: Option<DateTime<Utc>>,
}

/// Check a secret name: 1..=127 characters of `[0-9A-Za-z-]`
pub fn validate_name(name: &str) -> Result<(), GatewayError> {
    if name.is_empty() {
        return Err(GatewayError::validation("Secret name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GatewayError::validation(format!(
            "Secret name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(GatewayError::validation(
            "Secret name may only contain letters, digits and dashes",
        ));
    }
    Ok(())
}

/// Check a secret value: must be non-empty
pub fn validate_value(value: &str) -> Result<(), GatewayError> {
    if value.is_empty() {
        return Err(GatewayError::validation("Secret value must not be empty"));
    }
    Ok(())
}
