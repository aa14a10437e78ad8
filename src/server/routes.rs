//! Router configuration for the query service.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the router with every route of the web UI.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/query", get(handlers::query))
        .route("/set_fav", get(handlers::set_fav))
        .route("/dbmeta", get(handlers::dbmeta))
        .route("/status", get(handlers::status))
        .route("/turnoff", get(handlers::turnoff))
        // The UI is served from file:// or another port.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
