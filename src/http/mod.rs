//! HTTP boundary: exposes the resolver as `GET /deck` with conditional responses.

pub mod error;
pub mod headers;
pub mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::resolver::DeckResolutionCache;

pub use error::AppError;
pub use headers::set_conditional_headers;

/// Shared application state available to all route handlers via Axum's
/// `State` extractor.
pub struct AppState {
    pub cache: DeckResolutionCache,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/deck", get(routes::get_deck))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
