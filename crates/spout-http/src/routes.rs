//! Route configuration for the HTTP surface.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_route, delete_route, get_route, list_routes, logs_all, logs_selected,
};
use crate::state::AppState;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Live log streams
        .route("/logs", get(logs_all))
        .route("/logs/{*selector}", get(logs_selected))
        // Route registry
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/{id}", get(get_route).delete(delete_route))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
