//! Secret storage for kvgate
//!
//! Provides:
//! - The `SecretStore` trait (get, set, list, soft delete)
//! - An Azure Key Vault client speaking the data-plane REST API
//! - A credential chain (service principal, managed identity, Azure CLI)
//! - A bounded read-through cache with per-key invalidation
//! - An in-memory store with vault-like versioning for local runs and tests

pub mod cache;
pub mod client;
pub mod credential;
pub mod handlers;
mod memory;
mod store;

pub use cache::{CachedSecretStore, DEFAULT_CACHE_CAPACITY};
pub use client::{KeyVaultClient, DEFAULT_API_VERSION, KEY_VAULT_SCOPE};
pub use credential::{AccessToken, CredentialError, DefaultCredential, TokenCredential};
pub use handlers::SecretsState;
pub use memory::{InMemorySecretStore, MEMORY_ENDPOINT};
pub use store::{SecretStore, SecretValue, StoreError};
