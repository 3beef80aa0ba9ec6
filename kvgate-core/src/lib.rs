//! Core types for kvgate
//!
//! This crate provides the secret model and the error taxonomy shared by the
//! store, auth and HTTP crates.

pub mod error;
pub mod secret;

pub use error::{ErrorCode, GatewayError};
pub use secret::{validate_name, validate_value, DeletedSecret, Secret, MAX_NAME_LEN};
