//! Store wiring and application state construction

use std::sync::Arc;
use std::time::Duration;

use kvgate_auth::BearerAuth;
use kvgate_core::GatewayError;
use kvgate_keyvault::{
    CachedSecretStore, DefaultCredential, InMemorySecretStore, KeyVaultClient, SecretStore,
    SecretsState,
};
use tracing::{info, warn};

use crate::config::{Backend, Config};
use crate::router::AppState;

/// Build the backing store named by the configuration, behind the cache
pub fn build_store(config: &Config) -> Result<Arc<dyn SecretStore>, GatewayError> {
    config.validate()?;

    let backend: Arc<dyn SecretStore> = match config.store.backend {
        Backend::Memory => {
            info!("Using in-memory secret store");
            Arc::new(InMemorySecretStore::new())
        }
        Backend::KeyVault => {
            let url = config.vault.url.as_deref().unwrap_or_default();
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.vault.request_timeout_secs))
                .build()
                .map_err(|e| GatewayError::config(format!("HTTP client: {}", e)))?;

            let credential = DefaultCredential::from_env(http.clone());
            info!(sources = ?credential.source_names(), "Credential chain configured");

            let client = KeyVaultClient::new(url, Arc::new(credential), http)?
                .with_api_version(config.vault.api_version.clone());
            Arc::new(client)
        }
    };

    info!(capacity = config.cache.capacity, "Secret cache enabled");
    Ok(Arc::new(CachedSecretStore::new(
        backend,
        config.cache.capacity,
    )))
}

/// Build everything the router needs; called once at startup
pub fn build_state(config: &Config) -> Result<AppState, GatewayError> {
    let store = build_store(config)?;

    let auth = BearerAuth::new(config.auth.api_token.clone());
    if auth.is_default() {
        warn!("API_TOKEN not set, the listing endpoint accepts the public demo token");
    }

    Ok(AppState::new(SecretsState::new(store), auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvgate_core::ErrorCode;

    #[test]
    fn test_keyvault_backend_without_url_fails_fast() {
        let err = build_store(&Config::default()).err().expect("expected error");
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_invalid_vault_url_is_config_error() {
        let mut config = Config::default();
        config.vault.url = Some("not a url".to_string());
        let err = build_store(&config).err().expect("expected error");
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_keyvault_endpoint_reported() {
        let mut config = Config::default();
        config.vault.url = Some("https://myvault.vault.azure.net/".to_string());
        let store = build_store(&config).unwrap();
        assert_eq!(store.endpoint(), "https://myvault.vault.azure.net/");
    }

    #[test]
    fn test_memory_backend() {
        let mut config = Config::default();
        config.store.backend = Backend::Memory;
        let store = build_store(&config).unwrap();
        assert_eq!(store.endpoint(), kvgate_keyvault::MEMORY_ENDPOINT);
    }
}
