pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::quiz::handlers;
use crate::state::AppState;
use crate::uploads::{MAX_FILES, MAX_FILE_BYTES};

/// Every file at the size limit plus room for form fields and part headers.
const MAX_BODY_BYTES: usize = MAX_FILES * MAX_FILE_BYTES as usize + 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_handler))
        .route(
            "/api/generate-quiz",
            post(handlers::handle_generate_quiz).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
