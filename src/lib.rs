use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod marketplace;
pub mod mcp;

#[cfg(test)]
mod test_support;

use credentials::CredentialStore;
use marketplace::client::MarketplaceApi;

#[derive(Clone)]
pub struct AppState {
    pub api_token: Option<Arc<str>>,
    pub marketplace: Arc<dyn MarketplaceApi>,
    pub credentials: Arc<CredentialStore>,
}

impl AppState {
    pub fn new(
        api_token: Option<String>,
        marketplace: Arc<dyn MarketplaceApi>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            api_token: api_token
                .filter(|token| !token.is_empty())
                .map(Arc::<str>::from),
            marketplace,
            credentials,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
