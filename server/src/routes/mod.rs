//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the REST surface, the websocket endpoint, and the static
//! upload directory under a single Axum router. REST handles adventure
//! lifecycle and ticket minting; everything inside a live session flows over
//! the websocket.

pub mod adventures;
pub mod uploads;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_dir = state.config.upload_dir.clone();

    Router::new()
        .route(
            "/api/adventure",
            get(adventures::list_adventures_rest).post(adventures::create_adventure_rest),
        )
        .route("/api/adventure/{id}", delete(adventures::delete_adventure_rest))
        .route("/api/adventure/{id}/verify", post(adventures::verify_adventure_rest))
        .route("/api/adventure/{id}/join", post(adventures::join_adventure_rest))
        .route(
            "/api/adventure/{id}/upload",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(uploads::UPLOAD_BODY_LIMIT)),
        )
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
