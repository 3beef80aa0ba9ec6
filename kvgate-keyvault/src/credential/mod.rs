//! Identity credentials for reaching Key Vault
//!
//! Tokens come from the hosting environment. The default chain probes, in
//! order, a service principal configured through environment variables, the
//! managed identity endpoint, and an Azure CLI session. The first source that
//! produces a token is remembered and used for later requests.

mod azure_cli;
mod chain;
mod environment;
mod managed_identity;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;

pub use azure_cli::AzureCliCredential;
pub use chain::DefaultCredential;
pub use environment::{EnvironmentCredential, ServicePrincipal, DEFAULT_AUTHORITY_HOST};
pub use managed_identity::{ManagedIdentityCredential, ManagedIdentitySettings, IMDS_ENDPOINT};

/// Refresh tokens this long before they expire
pub(crate) const REFRESH_MARGIN_SECS: i64 = 300;

/// Errors while acquiring a token
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The source is not configured in this environment; the chain moves on
    #[error("{credential} unavailable: {reason}")]
    Unavailable {
        credential: &'static str,
        reason: String,
    },

    /// The source is configured but refused to issue a token
    #[error("{credential} authentication failed: {reason}")]
    Authentication {
        credential: &'static str,
        reason: String,
    },

    #[error("No credential could provide a token: {0}")]
    ChainExhausted(String),
}

impl CredentialError {
    pub(crate) fn unavailable(credential: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            credential,
            reason: reason.into(),
        }
    }

    pub(crate) fn authentication(credential: &'static str, reason: impl Into<String>) -> Self {
        Self::Authentication {
            credential,
            reason: reason.into(),
        }
    }
}

/// A bearer token and its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Whether the token expires within the refresh margin of `now`
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - Duration::seconds(REFRESH_MARGIN_SECS) <= now
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// A source of access tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Acquire a token for an OAuth scope such as `https://vault.azure.net/.default`
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// A fixed token, for emulators and tests
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &'static str {
        "StaticTokenCredential"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        Ok(AccessToken::new(
            self.token.clone(),
            Utc::now() + Duration::hours(24),
        ))
    }
}

/// Managed identity and the CLI take a resource rather than a scope
pub(crate) fn resource_for_scope(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Read an epoch-seconds field that token endpoints send as number or string
pub(crate) fn epoch_field(body: &Value, field: &str) -> Option<DateTime<Utc>> {
    let secs = match body.get(field)? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

/// Read an `expires_in` style field (seconds from now), number or string
pub(crate) fn relative_expiry(body: &Value, field: &str) -> Option<DateTime<Utc>> {
    let secs = match body.get(field)? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Some(Utc::now() + Duration::seconds(secs))
}
