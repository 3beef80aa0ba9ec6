//! Azure Key Vault data-plane client
//!
//! Speaks the secrets REST API directly over `reqwest`:
//!
//! | Operation | Request |
//! |---|---|
//! | get | `GET {vault}/secrets/{name}` |
//! | set | `PUT {vault}/secrets/{name}` with `{"value": ...}` |
//! | list | `GET {vault}/secrets`, following `nextLink` |
//! | delete | `DELETE {vault}/secrets/{name}` (soft delete) |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use kvgate_core::DeletedSecret;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::credential::TokenCredential;
use crate::store::{SecretStore, SecretValue, StoreError};

/// OAuth scope for Key Vault tokens
pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Data-plane API version
pub const DEFAULT_API_VERSION: &str = "7.4";

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: Option<String>,
    id: String,
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SecretListResult {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletedSecretBundle {
    recovery_id: Option<String>,
    scheduled_purge_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Client for one vault
pub struct KeyVaultClient {
    vault_url: Url,
    endpoint: String,
    api_version: String,
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
}

impl std::fmt::Debug for KeyVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultClient")
            .field("vault_url", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl KeyVaultClient {
    /// Create a client for a vault URL such as `https://myvault.vault.azure.net/`
    pub fn new(
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
        http: reqwest::Client,
    ) -> Result<Self, StoreError> {
        let parsed = Url::parse(vault_url)
            .map_err(|e| StoreError::InvalidEndpoint(format!("{}: {}", vault_url, e)))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(StoreError::InvalidEndpoint(format!(
                "{}: expected an http(s) URL",
                vault_url
            )));
        }

        info!(vault_url = %vault_url, "Key Vault client initialized");

        Ok(Self {
            vault_url: parsed,
            endpoint: vault_url.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            http,
            credential,
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// `{vault}/{segments...}?api-version=...`
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.vault_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", &self.api_version);
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Response, StoreError> {
        let token = self.credential.get_token(KEY_VAULT_SCOPE).await?;
        debug!(method = %method, url = %url, "Key Vault request");

        let mut request = self.http.request(method, url).bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request.send().await?)
    }

    async fn bundle(response: Response, name: &str) -> Result<SecretValue, StoreError> {
        let response = check(response, name).await?;
        let bundle: SecretBundle = response.json().await?;
        let version = parse_secret_id(&bundle.id)
            .and_then(|(_, version)| version)
            .ok_or_else(|| {
                StoreError::Provider(format!("secret id without version: {}", bundle.id))
            })?;

        Ok(SecretValue {
            value: bundle.value.unwrap_or_default(),
            version,
        })
    }
}

/// Map a non-success response to a store error
async fn check(response: Response, name: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(name.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => format!("{} ({}): {}", status, body.error.code, body.error.message),
        Err(_) if text.is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, text),
    };
    Err(StoreError::Provider(message))
}

/// Split `https://{vault}/secrets/{name}[/{version}]` into name and version
pub(crate) fn parse_secret_id(id: &str) -> Option<(String, Option<String>)> {
    let url = Url::parse(id).ok()?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    if segments.next()? != "secrets" {
        return None;
    }
    let name = segments.next()?.to_string();
    let version = segments.next().map(str::to_string);
    Some((name, version))
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get(&self, name: &str) -> Result<SecretValue, StoreError> {
        let response = self
            .send(Method::GET, self.url(&["secrets", name]), None)
            .await?;

        match Self::bundle(response, name).await {
            Ok(secret) => {
                info!(name = %name, version = %secret.version, "Retrieved secret");
                Ok(secret)
            }
            Err(StoreError::NotFound(name)) => {
                warn!(name = %name, "Secret not found");
                Err(StoreError::NotFound(name))
            }
            Err(e) => {
                error!(name = %name, error = %e, "Key Vault error retrieving secret");
                Err(e)
            }
        }
    }

    async fn set(&self, name: &str, value: &str) -> Result<String, StoreError> {
        let body = serde_json::json!({ "value": value });
        let response = self
            .send(Method::PUT, self.url(&["secrets", name]), Some(body))
            .await?;

        match Self::bundle(response, name).await {
            Ok(secret) => {
                info!(name = %name, version = %secret.version, "Set secret");
                Ok(secret.version)
            }
            Err(e) => {
                error!(name = %name, error = %e, "Key Vault error setting secret");
                Err(e)
            }
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut next = Some(self.url(&["secrets"]));

        while let Some(url) = next.take() {
            let response = self.send(Method::GET, url, None).await?;
            let response = check(response, "").await.map_err(|e| match e {
                StoreError::NotFound(_) => StoreError::Provider("404 Not Found".to_string()),
                other => other,
            });
            let page: SecretListResult = match response {
                Ok(response) => response.json().await?,
                Err(e) => {
                    error!(error = %e, "Key Vault error listing secrets");
                    return Err(e);
                }
            };

            names.extend(
                page.value
                    .iter()
                    .filter_map(|item| parse_secret_id(&item.id).map(|(name, _)| name)),
            );

            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    StoreError::Provider(format!("invalid nextLink {}: {}", link, e))
                })?),
                None => None,
            };
        }

        info!(count = names.len(), "Listed secrets");
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<DeletedSecret, StoreError> {
        let response = self
            .send(Method::DELETE, self.url(&["secrets", name]), None)
            .await?;

        let response = match check(response, name).await {
            Ok(response) => response,
            Err(e) => {
                error!(name = %name, error = %e, "Key Vault error deleting secret");
                return Err(e);
            }
        };
        let bundle: DeletedSecretBundle = response.json().await?;
        info!(name = %name, "Deleted secret");

        Ok(DeletedSecret {
            name: name.to_string(),
            recovery_id: bundle.recovery_id,
            scheduled_purge_date: bundle
                .scheduled_purge_date
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        })
    }
}
