//! First-match credential chain with token caching

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    AccessToken, AzureCliCredential, CredentialError, EnvironmentCredential,
    ManagedIdentityCredential, ManagedIdentitySettings, TokenCredential,
};

#[derive(Debug, Default)]
struct ChainState {
    /// Index of the source that last produced a token
    selected: Option<usize>,
    /// Tokens by scope
    tokens: HashMap<String, AccessToken>,
}

/// Tries each source in order and sticks with the first one that works
///
/// Sources reporting `Unavailable` are skipped. An `Authentication` failure
/// from a configured source ends the search, since falling through would hide
/// a misconfiguration. Tokens are reused until they near expiry.
pub struct DefaultCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
    state: Mutex<ChainState>,
}

impl std::fmt::Debug for DefaultCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCredential")
            .field("sources", &self.source_names())
            .finish_non_exhaustive()
    }
}

impl DefaultCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Environment service principal, then managed identity, then Azure CLI
    pub fn from_env(http: reqwest::Client) -> Self {
        Self::new(vec![
            Arc::new(EnvironmentCredential::from_env(http.clone())),
            Arc::new(ManagedIdentityCredential::new(
                http,
                ManagedIdentitySettings::from_env(),
            )),
            Arc::new(AzureCliCredential::default()),
        ])
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    fn name(&self) -> &'static str {
        "DefaultCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut state = self.state.lock().await;

        if let Some(token) = state.tokens.get(scope) {
            if !token.needs_refresh(Utc::now()) {
                return Ok(token.clone());
            }
        }

        if let Some(index) = state.selected {
            let token = self.sources[index].get_token(scope).await?;
            state.tokens.insert(scope.to_string(), token.clone());
            return Ok(token);
        }

        let mut reasons = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(credential = source.name(), "Selected credential source");
                    state.selected = Some(index);
                    state.tokens.insert(scope.to_string(), token.clone());
                    return Ok(token);
                }
                Err(err @ CredentialError::Unavailable { .. }) => {
                    debug!(credential = source.name(), reason = %err, "Credential source skipped");
                    reasons.push(err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        Err(CredentialError::ChainExhausted(reasons.join("; ")))
    }
}
