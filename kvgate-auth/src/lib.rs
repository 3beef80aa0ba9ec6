//! Bearer token authentication for kvgate
//!
//! A single expected token configured at startup gates the protected routes.
//! There is no expiry, scoping or revocation.

pub mod bearer;

pub use bearer::{parse_bearer, require_bearer, AuthError, BearerAuth, DEFAULT_API_TOKEN};
