//! Background image uploads: one multipart image part in, a static
//! `/uploads` URL out.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::routes::adventures::adventure_error_to_status;
use crate::services::adventure;
use crate::services::session::bytes_to_hex;
use crate::state::AppState;

/// Request body cap for uploads.
pub const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn random_filename(extension: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}.{extension}", bytes_to_hex(&bytes))
}

/// `POST /api/adventure/:id/upload` — store one image under the upload
/// directory and return its serving URL.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(adventure_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let exists = adventure::adventure_exists(&state.pool, adventure_id)
        .await
        .map_err(adventure_error_to_status)?;
    if !exists {
        return Err(StatusCode::NOT_FOUND);
    }

    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        // Skip non-image parts; the first image part wins.
        let Some(extension) = field.content_type().and_then(extension_for) else {
            continue;
        };

        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        if data.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }

        let filename = random_filename(extension);
        let path = state.config.upload_dir.join(&filename);
        tokio::fs::write(&path, &data).await.map_err(|err| {
            warn!(%err, path = %path.display(), "upload write failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        info!(%adventure_id, %filename, bytes = data.len(), "stored upload");
        return Ok(Json(serde_json::json!({ "url": format!("/uploads/{filename}") })));
    }

    Err(StatusCode::BAD_REQUEST)
}

#[cfg(test)]
#[path = "uploads_test.rs"]
mod tests;
