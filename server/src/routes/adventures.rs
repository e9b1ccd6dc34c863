//! Adventure REST routes: lifecycle plus websocket ticket minting.
//!
//! TICKETS
//! =======
//! The websocket endpoint cannot carry a request body, so role assignment
//! happens here: `verify` checks the adventure password and mints a host
//! ticket, `join` mints an observer ticket for any existing adventure. The
//! socket handshake redeems the ticket exactly once.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::adventure::{self, AdventureError, AdventureRow};
use crate::services::session;
use crate::state::{AppState, Role};

#[derive(Deserialize)]
pub struct CreateAdventureBody {
    pub name: String,
    pub description: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PasswordBody {
    pub password: Option<String>,
}

/// `GET /api/adventure` — list adventures, newest first.
pub async fn list_adventures_rest(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdventureRow>>, StatusCode> {
    let rows = adventure::list_adventures(&state.pool)
        .await
        .map_err(adventure_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/adventure` — create an adventure.
pub async fn create_adventure_rest(
    State(state): State<AppState>,
    Json(body): Json<CreateAdventureBody>,
) -> Result<(StatusCode, Json<AdventureRow>), StatusCode> {
    if body.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = adventure::create_adventure(
        &state.pool,
        body.name.trim(),
        body.description.as_deref().unwrap_or(""),
        body.password.as_deref(),
    )
    .await
    .map_err(adventure_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `DELETE /api/adventure/:id` — delete an adventure after the password check.
pub async fn delete_adventure_rest(
    State(state): State<AppState>,
    Path(adventure_id): Path<Uuid>,
    body: Option<Json<PasswordBody>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let Json(body) = body.unwrap_or_default();
    adventure::delete_adventure(&state.pool, adventure_id, body.password.as_deref())
        .await
        .map_err(adventure_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/adventure/:id/verify` — check the password and mint a host
/// ticket.
pub async fn verify_adventure_rest(
    State(state): State<AppState>,
    Path(adventure_id): Path<Uuid>,
    body: Option<Json<PasswordBody>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let Json(body) = body.unwrap_or_default();
    adventure::verify_adventure_password(&state.pool, adventure_id, body.password.as_deref())
        .await
        .map_err(adventure_error_to_status)?;

    let ticket = session::mint_ticket(&state, adventure_id, Role::Host).await;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

/// `POST /api/adventure/:id/join` — mint an observer ticket for an existing
/// adventure. No password gate.
pub async fn join_adventure_rest(
    State(state): State<AppState>,
    Path(adventure_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let exists = adventure::adventure_exists(&state.pool, adventure_id)
        .await
        .map_err(adventure_error_to_status)?;
    if !exists {
        return Err(StatusCode::NOT_FOUND);
    }

    let ticket = session::mint_ticket(&state, adventure_id, Role::Observer).await;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

pub(crate) fn adventure_error_to_status(err: AdventureError) -> StatusCode {
    match err {
        AdventureError::NotFound(_) => StatusCode::NOT_FOUND,
        AdventureError::PasswordRequired | AdventureError::PasswordInvalid => {
            StatusCode::UNAUTHORIZED
        }
        AdventureError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "adventures_test.rs"]
mod tests;
