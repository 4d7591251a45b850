use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.storage.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Meeting intake
        .route("/api/v1/upload", post(handlers::upload_meeting))
        // Meeting queries
        .route(
            "/meetings/:meeting_id/status",
            get(handlers::get_meeting_status),
        )
        .layer(
            ServiceBuilder::new()
                // Add tracing middleware for request logging
                .layer(TraceLayer::new_for_http())
                // Recordings are far larger than axum's 2 MiB default
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}
