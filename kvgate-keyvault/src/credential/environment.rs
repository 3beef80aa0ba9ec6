//! Service principal credential configured through environment variables

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{relative_expiry, AccessToken, CredentialError, TokenCredential};

/// Microsoft Entra ID authority used when `AZURE_AUTHORITY_HOST` is unset
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const NAME: &str = "EnvironmentCredential";

/// Client-secret service principal settings
#[derive(Clone)]
pub struct ServicePrincipal {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
}

impl std::fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}

impl ServicePrincipal {
    /// Read `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`
    ///
    /// Returns `None` unless all three are set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Some(Self {
            tenant_id: non_empty("AZURE_TENANT_ID")?,
            client_id: non_empty("AZURE_CLIENT_ID")?,
            client_secret: non_empty("AZURE_CLIENT_SECRET")?,
            authority_host: non_empty("AZURE_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
        })
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

/// Client-credentials grant against Entra ID
#[derive(Debug)]
pub struct EnvironmentCredential {
    http: reqwest::Client,
    principal: Option<ServicePrincipal>,
}

impl EnvironmentCredential {
    pub fn new(http: reqwest::Client, principal: Option<ServicePrincipal>) -> Self {
        Self { http, principal }
    }

    pub fn from_env(http: reqwest::Client) -> Self {
        Self::new(http, ServicePrincipal::from_env())
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let principal = self.principal.as_ref().ok_or_else(|| {
            CredentialError::unavailable(
                NAME,
                "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET are not all set",
            )
        })?;

        debug!(
            tenant = %principal.tenant_id,
            client_id = %principal.client_id,
            "Requesting service principal token"
        );

        let response = self
            .http
            .post(principal.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", principal.client_id.as_str()),
                ("client_secret", principal.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::authentication(NAME, e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| CredentialError::authentication(NAME, e.to_string()))?;

        if !status.is_success() {
            let description = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("no error description");
            return Err(CredentialError::authentication(
                NAME,
                format!("{}: {}", status, description),
            ));
        }

        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| CredentialError::authentication(NAME, "response has no access_token"))?;
        let expires_on = relative_expiry(&body, "expires_in")
            .ok_or_else(|| CredentialError::authentication(NAME, "response has no expires_in"))?;

        Ok(AccessToken::new(token, expires_on))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_principal_requires_all_variables() {
        assert!(ServicePrincipal::from_lookup(lookup(&[
            ("AZURE_TENANT_ID", "t"),
            ("AZURE_CLIENT_ID", "c"),
        ]))
        .is_none());

        assert!(ServicePrincipal::from_lookup(lookup(&[
            ("AZURE_TENANT_ID", "t"),
            ("AZURE_CLIENT_ID", "c"),
            ("AZURE_CLIENT_SECRET", ""),
        ]))
        .is_none());
    }

    #[test]
    fn test_principal_token_url() {
        let principal = ServicePrincipal::from_lookup(lookup(&[
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(
            principal.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
        assert!(!format!("{:?}", principal).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_unconfigured_is_unavailable() {
        let credential = EnvironmentCredential::new(reqwest::Client::new(), None);
        let err = credential.get_token("scope").await.unwrap_err();
        assert!(matches!(err, CredentialError::Unavailable { .. }));
    }
}
