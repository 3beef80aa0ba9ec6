//! kvgate - HTTP gateway for Azure Key Vault secrets
//!
//! Serves create, fetch, delete and list endpoints over a Key Vault (or an
//! in-memory store), with a read-through cache and a static bearer token on
//! the listing endpoint.

pub mod config;
pub mod panel;
pub mod router;
pub mod server;
