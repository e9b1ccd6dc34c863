//! Layer service — ordered annotation layers stored as a JSONB array.
//!
//! DESIGN
//! ======
//! Layers are opaque JSON objects addressed by a string `id`; the server
//! never interprets their contents beyond that. All mutations are expressed
//! as pure functions over the current array, then committed with the same
//! persist-then-update-memory discipline as the map service. Replies and
//! broadcasts carry the full resulting array so clients replace wholesale
//! instead of patching.

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use frames::{Data, ErrorCode};

use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("session is not loaded")]
    SessionNotLoaded,
    #[error("reorder ids do not match the current layer set")]
    ReorderMismatch,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for LayerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotLoaded => "E_SESSION_NOT_LOADED",
            Self::ReorderMismatch => "E_LAYER_REORDER",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// PURE ARRAY OPERATIONS
// =============================================================================

fn layer_id_of(layer: &Value) -> Option<&str> {
    layer.get("id").and_then(Value::as_str)
}

/// Append a layer, assigning a fresh id when the client sent none. Returns
/// the new array and the layer as stored.
pub(crate) fn append_layer(layers: &Value, mut layer: Value) -> (Value, Value) {
    if let Some(obj) = layer.as_object_mut() {
        let has_id = obj.get("id").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
        if !has_id {
            obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
    }
    let mut arr = layers.as_array().cloned().unwrap_or_default();
    arr.push(layer.clone());
    (Value::Array(arr), layer)
}

/// Merge a patch into the addressed layer. `None` when the layer is gone.
/// The `id` key is never patched over.
pub(crate) fn merge_layer(layers: &Value, layer_id: &str, patch: &Data) -> Option<Value> {
    let mut arr = layers.as_array().cloned().unwrap_or_default();
    let target = arr.iter_mut().find(|l| layer_id_of(l) == Some(layer_id))?;
    let obj = target.as_object_mut()?;
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        obj.insert(key.clone(), value.clone());
    }
    Some(Value::Array(arr))
}

/// Drop the addressed layer. `None` when the layer is already gone.
pub(crate) fn remove_layer(layers: &Value, layer_id: &str) -> Option<Value> {
    let arr = layers.as_array().cloned().unwrap_or_default();
    let filtered: Vec<Value> =
        arr.iter().filter(|l| layer_id_of(l) != Some(layer_id)).cloned().collect();
    if filtered.len() == arr.len() {
        return None;
    }
    Some(Value::Array(filtered))
}

/// Rebuild the array in the given id order. `None` unless the ids match the
/// current set exactly (same length, every id present, no duplicates).
pub(crate) fn reorder_layers(layers: &Value, ordered_ids: &[String]) -> Option<Value> {
    let mut remaining = layers.as_array().cloned().unwrap_or_default();
    if remaining.len() != ordered_ids.len() {
        return None;
    }
    let mut reordered = Vec::with_capacity(ordered_ids.len());
    for id in ordered_ids {
        let pos = remaining.iter().position(|l| layer_id_of(l) == Some(id.as_str()))?;
        reordered.push(remaining.remove(pos));
    }
    Some(Value::Array(reordered))
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Run one pure mutation against the map's layer array and commit the result.
/// `Ok(None)` when the map or the addressed layer vanished under the edit.
async fn commit_layers(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    mutate: impl FnOnce(&Value) -> Result<Option<Value>, LayerError>,
) -> Result<Option<Value>, LayerError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&adventure_id).ok_or(LayerError::SessionNotLoaded)?;
    let Some(map) = session.maps.get(&map_id) else {
        debug!(%adventure_id, %map_id, "layer edit for missing map, ignoring");
        return Ok(None);
    };

    let updated = match mutate(&map.layers)? {
        Some(updated) => updated,
        None => {
            debug!(%adventure_id, %map_id, "layer edit target missing, ignoring");
            return Ok(None);
        }
    };

    sqlx::query("UPDATE maps SET layers = $2 WHERE id = $1")
        .bind(map_id)
        .bind(&updated)
        .execute(&state.pool)
        .await?;

    if let Some(map) = session.maps.get_mut(&map_id) {
        map.layers = updated.clone();
    }
    Ok(Some(updated))
}

/// Append a layer to a map.
///
/// # Errors
///
/// Returns `SessionNotLoaded` or a database error if the commit fails.
pub async fn add_layer(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    layer: Value,
) -> Result<Option<Value>, LayerError> {
    commit_layers(state, adventure_id, map_id, move |layers| {
        let (updated, _stored) = append_layer(layers, layer);
        Ok(Some(updated))
    })
    .await
}

/// Merge a patch into one layer of a map.
///
/// # Errors
///
/// Returns `SessionNotLoaded` or a database error if the commit fails.
pub async fn update_layer(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    layer_id: &str,
    patch: &Data,
) -> Result<Option<Value>, LayerError> {
    commit_layers(state, adventure_id, map_id, |layers| Ok(merge_layer(layers, layer_id, patch)))
        .await
}

/// Delete one layer of a map.
///
/// # Errors
///
/// Returns `SessionNotLoaded` or a database error if the commit fails.
pub async fn delete_layer(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    layer_id: &str,
) -> Result<Option<Value>, LayerError> {
    commit_layers(state, adventure_id, map_id, |layers| Ok(remove_layer(layers, layer_id))).await
}

/// Reorder a map's layers to the given id sequence.
///
/// # Errors
///
/// Returns `ReorderMismatch` when the ids do not cover the current set
/// exactly, `SessionNotLoaded`, or a database error if the commit fails.
pub async fn reorder(
    state: &AppState,
    adventure_id: Uuid,
    map_id: Uuid,
    ordered_ids: &[String],
) -> Result<Option<Value>, LayerError> {
    commit_layers(state, adventure_id, map_id, |layers| {
        reorder_layers(layers, ordered_ids).map(Some).ok_or(LayerError::ReorderMismatch)
    })
    .await
}

#[cfg(test)]
#[path = "layer_test.rs"]
mod tests;
