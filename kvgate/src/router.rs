//! HTTP router for kvgate

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use kvgate_auth::{require_bearer, BearerAuth};
use kvgate_keyvault::{handlers, SecretsState};

use crate::panel;

/// Shared state for the main router
pub struct AppState {
    secrets: Arc<SecretsState>,
    auth: Arc<BearerAuth>,
}

impl AppState {
    pub fn new(secrets: SecretsState, auth: BearerAuth) -> Self {
        Self {
            secrets: Arc::new(secrets),
            auth: Arc::new(auth),
        }
    }

    /// Endpoint of the backing store
    pub fn store_endpoint(&self) -> &str {
        self.secrets.store.endpoint()
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/secrets", get(handlers::list_secrets))
        .route_layer(middleware::from_fn_with_state(state.auth, require_bearer));

    Router::new()
        .route("/", get(panel::index))
        .route("/health", get(handlers::health))
        .route("/secrets", post(handlers::create_secret))
        .route(
            "/secrets/:name",
            get(handlers::get_secret).delete(handlers::delete_secret),
        )
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.secrets)
}
