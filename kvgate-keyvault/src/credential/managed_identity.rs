//! Managed identity credential (App Service identity endpoint or IMDS)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{
    epoch_field, relative_expiry, resource_for_scope, AccessToken, CredentialError,
    TokenCredential,
};

/// Azure Instance Metadata Service token endpoint
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const NAME: &str = "ManagedIdentityCredential";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Where to ask for managed identity tokens
#[derive(Clone)]
pub struct ManagedIdentitySettings {
    /// `IDENTITY_ENDPOINT`, set by App Service and Container Apps
    pub identity_endpoint: Option<String>,
    /// `IDENTITY_HEADER`, sent back as `X-IDENTITY-HEADER`
    pub identity_header: Option<String>,
    /// Client ID of a user-assigned identity (`AZURE_CLIENT_ID`)
    pub client_id: Option<String>,
    pub imds_endpoint: String,
    /// Bound on the IMDS probe; off-Azure hosts never answer it
    pub imds_timeout: Duration,
}

impl std::fmt::Debug for ManagedIdentitySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIdentitySettings")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("client_id", &self.client_id)
            .field("imds_endpoint", &self.imds_endpoint)
            .field("imds_timeout", &self.imds_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for ManagedIdentitySettings {
    fn default() -> Self {
        Self {
            identity_endpoint: None,
            identity_header: None,
            client_id: None,
            imds_endpoint: IMDS_ENDPOINT.to_string(),
            imds_timeout: Duration::from_secs(1),
        }
    }
}

impl ManagedIdentitySettings {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            identity_endpoint: var("IDENTITY_ENDPOINT"),
            identity_header: var("IDENTITY_HEADER"),
            client_id: var("AZURE_CLIENT_ID"),
            ..Self::default()
        }
    }
}

/// Tokens for the identity the host assigns to this process
#[derive(Debug)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    settings: ManagedIdentitySettings,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, settings: ManagedIdentitySettings) -> Self {
        Self { http, settings }
    }

    fn request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.settings.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        match (&self.settings.identity_endpoint, &self.settings.identity_header) {
            (Some(endpoint), Some(header)) => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header)
            }
            _ => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(&self.settings.imds_endpoint)
                    .query(&query)
                    .header("Metadata", "true")
                    .timeout(self.settings.imds_timeout)
            }
        }
    }

    fn uses_imds(&self) -> bool {
        self.settings.identity_endpoint.is_none() || self.settings.identity_header.is_none()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let resource = resource_for_scope(scope);
        let imds = self.uses_imds();
        debug!(resource = %resource, imds, "Requesting managed identity token");

        let response = self.request(resource).send().await.map_err(|e| {
            if imds {
                CredentialError::unavailable(NAME, format!("IMDS endpoint unreachable: {}", e))
            } else {
                CredentialError::authentication(NAME, e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CredentialError::authentication(NAME, e.to_string()))?;

        // IMDS answers 400 when the host has no identity assigned
        if imds && status == StatusCode::BAD_REQUEST {
            return Err(CredentialError::unavailable(
                NAME,
                format!("no managed identity assigned: {}", text),
            ));
        }
        if !status.is_success() {
            return Err(CredentialError::authentication(
                NAME,
                format!("{}: {}", status, text),
            ));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| CredentialError::authentication(NAME, e.to_string()))?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| CredentialError::authentication(NAME, "response has no access_token"))?;
        let expires_on = epoch_field(&body, "expires_on")
            .or_else(|| relative_expiry(&body, "expires_in"))
            .ok_or_else(|| CredentialError::authentication(NAME, "response has no expiry"))?;

        Ok(AccessToken::new(token, expires_on))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_imds() {
        let credential = ManagedIdentityCredential::new(
            reqwest::Client::new(),
            ManagedIdentitySettings::default(),
        );
        assert!(credential.uses_imds());
    }

    #[test]
    fn test_app_service_needs_endpoint_and_header() {
        let settings = ManagedIdentitySettings {
            identity_endpoint: Some("http://localhost:4141/msi/token".to_string()),
            ..ManagedIdentitySettings::default()
        };
        let credential = ManagedIdentityCredential::new(reqwest::Client::new(), settings.clone());
        assert!(credential.uses_imds());

        let credential = ManagedIdentityCredential::new(
            reqwest::Client::new(),
            ManagedIdentitySettings {
                identity_header: Some("header".to_string()),
                ..settings
            },
        );
        assert!(!credential.uses_imds());
    }

    #[tokio::test]
    async fn test_unreachable_imds_is_unavailable() {
        let settings = ManagedIdentitySettings {
            // Port 9 (discard) on loopback refuses connections
            imds_endpoint: "http://127.0.0.1:9/metadata/identity/oauth2/token".to_string(),
            imds_timeout: Duration::from_millis(200),
            ..ManagedIdentitySettings::default()
        };
        let credential = ManagedIdentityCredential::new(reqwest::Client::new(), settings);

        let err = credential
            .get_token("https://vault.azure.net/.default")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Unavailable { .. }));
    }
}
