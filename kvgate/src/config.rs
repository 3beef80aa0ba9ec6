//! Configuration management
//!
//! Sources, lowest precedence first: built-in defaults, `kvgate.toml` (or the
//! file passed with `--config`), `KVGATE__SECTION__KEY` environment variables,
//! then the well-known `KEYVAULT_URL` and `API_TOKEN`. Command-line flags are
//! applied on top by the binary.

use std::collections::HashMap;
use std::path::Path;

use kvgate_auth::DEFAULT_API_TOKEN;
use kvgate_core::GatewayError;
use kvgate_keyvault::{DEFAULT_API_VERSION, DEFAULT_CACHE_CAPACITY};
use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// e.g. `https://myvault.vault.azure.net/`
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_api_token")]
    pub api_token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_token: default_api_token(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: Backend,
}

/// Where secrets are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
pub enum Backend {
    /// Azure Key Vault at `vault.url`
    #[default]
    #[serde(rename = "keyvault")]
    #[value(name = "keyvault")]
    KeyVault,

    /// In-process store, lost on exit
    #[serde(rename = "memory")]
    #[value(name = "memory")]
    Memory,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_api_token() -> String {
    DEFAULT_API_TOKEN.to_string()
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::from_sources(
            path,
            None,
            std::env::var("KEYVAULT_URL").ok(),
            std::env::var("API_TOKEN").ok(),
        )
    }

    /// Load with an explicit environment map instead of the process environment
    pub fn from_sources(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
        keyvault_url: Option<String>,
        api_token: Option<String>,
    ) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("kvgate").required(false),
        };

        let environment = config::Environment::with_prefix("KVGATE")
            .separator("__")
            .try_parsing(true)
            .source(env);

        let config = config::Config::builder()
            .add_source(file)
            .add_source(environment)
            .set_override_option("vault.url", keyvault_url)?
            .set_override_option("auth.api_token", api_token)?
            .build()?;

        config.try_deserialize::<Config>()
    }

    /// Reject configurations the gateway cannot serve with
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.store.backend == Backend::KeyVault
            && self.vault.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(GatewayError::config(
                "KeyVault URL not provided. Set KEYVAULT_URL env var.",
            ));
        }
        Ok(())
    }
}
