pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::extraction::handlers as extraction;
use crate::provisioning::handlers as provisioning;
use crate::state::AppState;

/// Largest accepted request body (resume uploads included).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Personas
        .route("/api/v1/personas", post(provisioning::handle_create_persona))
        .route(
            "/api/v1/personas/public",
            get(provisioning::handle_list_public),
        )
        // Documents
        .route(
            "/api/v1/documents/extract",
            post(extraction::handle_extract),
        )
        // Account
        .route(
            "/api/v1/account",
            get(provisioning::handle_get_account).patch(provisioning::handle_update_account),
        )
        .route(
            "/api/v1/account/credential",
            put(provisioning::handle_put_credential),
        )
        .route(
            "/api/v1/account/agent",
            post(provisioning::handle_retry_agent),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
