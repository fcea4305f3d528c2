pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

/// Resume uploads are small; anything bigger is rejected at the body layer.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/analyses", post(handlers::handle_submit))
        .route("/api/v1/analyses/:id/events", get(handlers::handle_events))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
