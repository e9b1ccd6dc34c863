//! Map service — map CRUD plus mask, view, and battlegrid persistence.
//!
//! DESIGN
//! ======
//! Every mutation here follows persist-then-broadcast: the row is written to
//! Postgres first, the in-memory session registry second, and the caller
//! broadcasts only after both succeed. The write lock on the registry is held
//! across the database round trip, which serializes mutations per session.
//!
//! STALE REFERENCES
//! ================
//! High-frequency edits (mask, view, battlegrid) racing a map delete are
//! no-ops, reported as `Ok(None)`. Management operations (update, delete,
//! activate) on a missing map are surfaced as `NotFound` so the host sees
//! them.

use canvas::codec::{self, EncodedMask, MaskFormat};
use canvas::consts::{MASK_HARD_CAP, MASK_SOFT_CAP};
use canvas::fit::ObserverView;
use canvas::mask::{FogPolicy, MaskCanvas};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use frames::{Data, ErrorCode};

use crate::state::{AppState, MapRecord, SessionState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("session is not loaded")]
    SessionNotLoaded,
    #[error("map not found: {0}")]
    NotFound(Uuid),
    #[error("mask payload is {0} bytes, past the hard size cap")]
    MaskOversize(usize),
    #[error("invalid mask payload: {0}")]
    InvalidMask(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for MapError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotLoaded => "E_SESSION_NOT_LOADED",
            Self::NotFound(_) => "E_MAP_NOT_FOUND",
            Self::MaskOversize(_) => "E_MASK_OVERSIZE",
            Self::InvalidMask(_) => "E_MASK_INVALID",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate an inbound mask payload without touching state: known format
/// label, image data URI prefix, and the hard size cap on the URI string.
///
/// # Errors
///
/// Returns `InvalidMask` for an unknown format or a non-image payload, and
/// `MaskOversize` past the hard cap.
pub fn validate_mask_payload(mask: &str, format: &str) -> Result<MaskFormat, MapError> {
    let parsed = format
        .parse::<MaskFormat>()
        .map_err(|_| MapError::InvalidMask(format!("unknown mask format {format:?}")))?;
    if !mask.starts_with("data:image/") {
        return Err(MapError::InvalidMask("mask is not an image data URI".to_string()));
    }
    if mask.len() > MASK_HARD_CAP {
        return Err(MapError::MaskOversize(mask.len()));
    }
    Ok(parsed)
}

fn json_i32(value: &Value) -> Option<i32> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|float| float as i64))
        .and_then(|v| i32::try_from(v).ok())
}

// =============================================================================
// MASK INITIALIZATION
// =============================================================================

/// Encode a fresh full-coverage mask for a new or replaced background.
/// Failures degrade to a map without a mask rather than failing the create.
async fn encode_initial_mask(policy: FogPolicy, width: i32, height: i32) -> Option<EncodedMask> {
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return None;
    };
    if width == 0 || height == 0 {
        return None;
    }

    let result = tokio::task::spawn_blocking(move || {
        codec::encode(MaskCanvas::new(width, height, policy).image())
    })
    .await;

    match result {
        Ok(Ok(encoded)) => Some(encoded),
        Ok(Err(err)) => {
            warn!(%err, width, height, "initial mask encode failed");
            None
        }
        Err(err) => {
            warn!(%err, "initial mask encode task failed");
            None
        }
    }
}

fn next_position(session: &SessionState) -> i32 {
    session.maps.values().map(|m| m.position).max().map_or(0, |p| p + 1)
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a map in a loaded session: fresh mask per the fog policy, default
/// observer view, empty layers, next position in the adventure's order.
///
/// # Errors
///
/// Returns `SessionNotLoaded` if no client holds the session open, or a
/// database error if the insert fails.
pub async fn create_map(
    state: &AppState,
    adventure_id: Uuid,
    name: &str,
    background_url: Option<&str>,
    width: i32,
    height: i32,
) -> Result<MapRecord, MapError> {
    // Encode before taking the lock; the map id is not visible to anyone yet.
    let initial = encode_initial_mask(state.config.fog_policy, width, height).await;

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;

    let view = ObserverView::default();
    let record = MapRecord {
        id: Uuid::new_v4(),
        adventure_id,
        name: name.to_string(),
        background_url: background_url.map(ToString::to_string),
        background_w: width,
        background_h: height,
        mask_data: initial.as_ref().map(|m| m.data_uri.clone()),
        mask_format: initial.as_ref().map(|m| m.format.as_str().to_string()),
        mask_w: initial.as_ref().map_or(0, |m| i32::try_from(m.width).unwrap_or(0)),
        mask_h: initial.as_ref().map_or(0, |m| i32::try_from(m.height).unwrap_or(0)),
        view_zoom: view.zoom,
        view_pan_x: view.pan_x,
        view_pan_y: view.pan_y,
        view_font_size: i32::try_from(view.label_font_size).unwrap_or(0),
        battlegrid: serde_json::json!({}),
        layers: serde_json::json!([]),
        position: next_position(session),
    };

    sqlx::query(
        "INSERT INTO maps (id, adventure_id, name, background_url, background_w, background_h,
                           mask_data, mask_format, mask_w, mask_h,
                           view_zoom, view_pan_x, view_pan_y, view_font_size,
                           battlegrid, layers, position)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(record.id)
    .bind(record.adventure_id)
    .bind(&record.name)
    .bind(&record.background_url)
    .bind(record.background_w)
    .bind(record.background_h)
    .bind(&record.mask_data)
    .bind(&record.mask_format)
    .bind(record.mask_w)
    .bind(record.mask_h)
    .bind(record.view_zoom)
    .bind(record.view_pan_x)
    .bind(record.view_pan_y)
    .bind(record.view_font_size)
    .bind(&record.battlegrid)
    .bind(&record.layers)
    .bind(record.position)
    .execute(&state.pool)
    .await?;

    session.maps.insert(record.id, record.clone());
    info!(%adventure_id, map_id = %record.id, name, "created map");
    Ok(record)
}

/// Merge a patch into a map. A patch touching `background_url` replaces the
/// background and re-initializes the mask at the patched dimensions.
///
/// # Errors
///
/// Returns `SessionNotLoaded`, `NotFound` for a missing map, or a database
/// error if the update fails.
pub async fn update_map(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    patch: &Data,
) -> Result<MapRecord, MapError> {
    // Resolve the patched background under a read lock so the (possibly slow)
    // mask encode can run without blocking other sessions.
    let (background_changed, new_w, new_h) = {
        let sessions = state.sessions.read().await;
        let session = sessions.get(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
        let map = session.maps.get(&map_id).ok_or(MapError::NotFound(map_id))?;
        let background_changed = patch.contains_key("background_url");
        let new_w = patch.get("background_w").and_then(json_i32).unwrap_or(map.background_w);
        let new_h = patch.get("background_h").and_then(json_i32).unwrap_or(map.background_h);
        (background_changed, new_w, new_h)
    };

    let fresh_mask = if background_changed {
        encode_initial_mask(state.config.fog_policy, new_w, new_h).await
    } else {
        None
    };

    // Re-check under the write lock; the map may have been deleted meanwhile.
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
    let map = session.maps.get(&map_id).ok_or(MapError::NotFound(map_id))?;

    let mut updated = map.clone();
    if let Some(name) = patch.get("name").and_then(Value::as_str) {
        updated.name = name.to_string();
    }
    updated.background_w = new_w;
    updated.background_h = new_h;
    if background_changed {
        updated.background_url =
            patch.get("background_url").and_then(Value::as_str).map(ToString::to_string);
        updated.mask_data = fresh_mask.as_ref().map(|m| m.data_uri.clone());
        updated.mask_format = fresh_mask.as_ref().map(|m| m.format.as_str().to_string());
        updated.mask_w = fresh_mask.as_ref().map_or(0, |m| i32::try_from(m.width).unwrap_or(0));
        updated.mask_h = fresh_mask.as_ref().map_or(0, |m| i32::try_from(m.height).unwrap_or(0));
    }

    sqlx::query(
        "UPDATE maps
         SET name = $2, background_url = $3, background_w = $4, background_h = $5,
             mask_data = $6, mask_format = $7, mask_w = $8, mask_h = $9
         WHERE id = $1",
    )
    .bind(map_id)
    .bind(&updated.name)
    .bind(&updated.background_url)
    .bind(updated.background_w)
    .bind(updated.background_h)
    .bind(&updated.mask_data)
    .bind(&updated.mask_format)
    .bind(updated.mask_w)
    .bind(updated.mask_h)
    .execute(&state.pool)
    .await?;

    session.maps.insert(map_id, updated.clone());
    info!(%adventure_id, %map_id, background_changed, "updated map");
    Ok(updated)
}

/// Delete a map, clearing `active_map_id` if it pointed at the deleted map.
///
/// # Errors
///
/// Returns `SessionNotLoaded`, `NotFound` for a missing map, or a database
/// error if the delete fails.
pub async fn delete_map(state: &AppState, adventure_id: Uuid, map_id: Uuid) -> Result<(), MapError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
    if !session.maps.contains_key(&map_id) {
        return Err(MapError::NotFound(map_id));
    }

    sqlx::query("DELETE FROM maps WHERE id = $1")
        .bind(map_id)
        .execute(&state.pool)
        .await?;

    if session.active_map_id == Some(map_id) {
        sqlx::query("UPDATE adventures SET active_map_id = NULL WHERE id = $1")
            .bind(adventure_id)
            .execute(&state.pool)
            .await?;
        session.active_map_id = None;
    }

    session.maps.remove(&map_id);
    info!(%adventure_id, %map_id, "deleted map");
    Ok(())
}

/// Switch the adventure's active map. Validates membership in memory before
/// touching the database.
///
/// # Errors
///
/// Returns `SessionNotLoaded`, `NotFound` if the map is not part of this
/// session, or a database error if the update fails.
pub async fn set_active(state: &AppState, adventure_id: Uuid, map_id: Uuid) -> Result<(), MapError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
    if !session.maps.contains_key(&map_id) {
        return Err(MapError::NotFound(map_id));
    }

    sqlx::query("UPDATE adventures SET active_map_id = $2 WHERE id = $1")
        .bind(adventure_id)
        .bind(map_id)
        .execute(&state.pool)
        .await?;

    session.active_map_id = Some(map_id);
    info!(%adventure_id, %map_id, "activated map");
    Ok(())
}

// =============================================================================
// EDIT PERSISTENCE
// =============================================================================

/// Persist an encoded mask. `Ok(None)` means the map vanished under the edit
/// and the update was dropped.
///
/// # Errors
///
/// Returns the validation errors from [`validate_mask_payload`],
/// `SessionNotLoaded`, or a database error if the update fails.
pub async fn update_mask(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    mask: &str,
    format: &str,
    width: i32,
    height: i32,
) -> Result<Option<()>, MapError> {
    let parsed = validate_mask_payload(mask, format)?;
    if mask.len() > MASK_SOFT_CAP {
        warn!(%map_id, bytes = mask.len(), "mask payload above soft cap");
    }

    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
    if !session.maps.contains_key(&map_id) {
        debug!(%adventure_id, %map_id, "mask update for missing map, ignoring");
        return Ok(None);
    }

    sqlx::query(
        "UPDATE maps SET mask_data = $2, mask_format = $3, mask_w = $4, mask_h = $5 WHERE id = $1",
    )
    .bind(map_id)
    .bind(mask)
    .bind(parsed.as_str())
    .bind(width)
    .bind(height)
    .execute(&state.pool)
    .await?;

    if let Some(map) = session.maps.get_mut(&map_id) {
        map.mask_data = Some(mask.to_string());
        map.mask_format = Some(parsed.as_str().to_string());
        map.mask_w = width;
        map.mask_h = height;
    }
    Ok(Some(()))
}

/// Persist the host's observer view for a map. `Ok(None)` means the map
/// vanished under the edit.
///
/// # Errors
///
/// Returns `SessionNotLoaded` or a database error if the update fails.
pub async fn update_view(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    view: &ObserverView,
) -> Result<Option<()>, MapError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
    if !session.maps.contains_key(&map_id) {
        debug!(%adventure_id, %map_id, "view update for missing map, ignoring");
        return Ok(None);
    }

    let font_size = i32::try_from(view.label_font_size).unwrap_or(0);
    sqlx::query(
        "UPDATE maps SET view_zoom = $2, view_pan_x = $3, view_pan_y = $4, view_font_size = $5
         WHERE id = $1",
    )
    .bind(map_id)
    .bind(view.zoom)
    .bind(view.pan_x)
    .bind(view.pan_y)
    .bind(font_size)
    .execute(&state.pool)
    .await?;

    if let Some(map) = session.maps.get_mut(&map_id) {
        map.view_zoom = view.zoom;
        map.view_pan_x = view.pan_x;
        map.view_pan_y = view.pan_y;
        map.view_font_size = font_size;
    }
    Ok(Some(()))
}

/// Persist battlegrid state verbatim. `Ok(None)` means the map vanished
/// under the edit.
///
/// # Errors
///
/// Returns `SessionNotLoaded` or a database error if the update fails.
pub async fn update_battlegrid(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    battlegrid: &Value,
) -> Result<Option<()>, MapError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(MapError::SessionNotLoaded)?;
    if !session.maps.contains_key(&map_id) {
        debug!(%adventure_id, %map_id, "battlegrid update for missing map, ignoring");
        return Ok(None);
    }

    sqlx::query("UPDATE maps SET battlegrid = $2 WHERE id = $1")
        .bind(map_id)
        .bind(battlegrid)
        .execute(&state.pool)
        .await?;

    if let Some(map) = session.maps.get_mut(&map_id) {
        map.battlegrid = battlegrid.clone();
    }
    Ok(Some(()))
}

#[cfg(test)]
#[path = "map_test.rs"]
mod tests;
