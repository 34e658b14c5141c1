use crate::assets;
use crate::cors::{cors_layer, AllowedOrigins};
use crate::middleware::{request_id_middleware, security_headers_middleware};
use axum::middleware;
use axum::routing::get;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::health;
use super::AppState;

/// Create application router
///
/// The uploads router re-applies origin authorization itself because static
/// delivery bypasses the generic CORS layer's per-route decoration; the same
/// `AllowedOrigins` set backs both, so the two can never disagree.
pub fn create_router(
    state: Arc<AppState>,
    allowed_origins: AllowedOrigins,
    upload_dir: PathBuf,
) -> axum::Router {
    // Health check endpoint
    let health_routes = axum::Router::new()
        .route("/_health", get(health::health_check))
        .with_state(state);

    // File delivery under /uploads with its own CORS handling
    let upload_routes = assets::uploads_router(allowed_origins.clone(), upload_dir);

    // Merge routers and apply middleware layers
    health_routes
        .merge(upload_routes)
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
