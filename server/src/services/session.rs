//! Session registry, broadcast fan-out, and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! One live session per adventure. The first client to join hydrates the
//! session from Postgres (all maps plus the active map id); the last client
//! to part evicts it. Mutations persist before they touch the in-memory
//! copy, so eviction is a plain drop.
//!
//! Websocket upgrades are authenticated with one-time short-lived tickets
//! minted over REST. Ticket redemption is destructive to guarantee single
//! use; this favors replay safety over reconnect convenience.

use std::collections::HashMap;
use std::fmt::Write;
use std::time::Instant;

use frames::Frame;
use rand::Rng;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::state::{AppState, ConnectedClient, MapRecord, Role, SessionState, Ticket};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("adventure not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl frames::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ADVENTURE_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Everything a newly joined client needs to render: all maps in display
/// order plus which one observers are shown.
pub struct SessionSnapshot {
    pub maps: Vec<MapRecord>,
    pub active_map_id: Option<Uuid>,
}

// =============================================================================
// TICKETS
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a short-lived 16-byte hex WS ticket token.
#[must_use]
pub(crate) fn generate_ticket_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Mint a single-use websocket ticket bound to an adventure and role.
pub async fn mint_ticket(state: &AppState, adventure_id: Uuid, role: Role) -> String {
    let token = generate_ticket_token();
    let ticket = Ticket { adventure_id, role, expires_at: Instant::now() + state.config.ticket_ttl };
    let mut tickets = state.tickets.write().await;
    // Drop anything already past its TTL while we hold the lock.
    tickets.retain(|_, t| t.expires_at > Instant::now());
    tickets.insert(token.clone(), ticket);
    token
}

/// Redeem a ticket, consuming it. Returns the adventure and role it was
/// minted for, or `None` if the token is unknown, expired, or already used.
pub async fn redeem_ticket(state: &AppState, token: &str) -> Option<(Uuid, Role)> {
    let mut tickets = state.tickets.write().await;
    let ticket = tickets.remove(token)?;
    if ticket.expires_at <= Instant::now() {
        return None;
    }
    Some((ticket.adventure_id, ticket.role))
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a session. Hydrates from Postgres if not already in memory.
/// Returns the full snapshot for the joining client.
///
/// # Errors
///
/// Returns `NotFound` if the adventure does not exist, or a database error
/// if hydration fails.
pub async fn join_session(
    state: &AppState,
    adventure_id: Uuid,
    client_id: Uuid,
    role: Role,
    tx: mpsc::Sender<Frame>,
) -> Result<SessionSnapshot, SessionError> {
    let Some(active_map_id) = fetch_active_map_id(&state.pool, adventure_id).await? else {
        return Err(SessionError::NotFound(adventure_id));
    };

    // Fetch the map snapshot outside the lock; apply it only on first join.
    let hydration_snapshot = hydrate_maps(&state.pool, adventure_id).await?;

    let mut sessions = state.sessions.write().await;
    let session = sessions.entry(adventure_id).or_insert_with(SessionState::new);

    if session.clients.is_empty() {
        session.maps = hydration_snapshot;
        session.active_map_id = active_map_id;
        info!(%adventure_id, maps = session.maps.len(), "hydrated session from database");
    }

    session.clients.insert(client_id, ConnectedClient { role, tx });
    let snapshot = SessionSnapshot { maps: ordered_maps(session), active_map_id: session.active_map_id };

    info!(%adventure_id, %client_id, role = role.as_str(), clients = session.clients.len(), "client joined session");
    Ok(snapshot)
}

/// Leave a session. Removes the client; evicts the session state from
/// memory when the last client is gone.
pub async fn part_session(state: &AppState, adventure_id: Uuid, client_id: Uuid) {
    let mut sessions = state.sessions.write().await;
    let Some(session) = sessions.get_mut(&adventure_id) else {
        return;
    };

    session.clients.remove(&client_id);
    info!(%adventure_id, %client_id, remaining = session.clients.len(), "client left session");

    if session.clients.is_empty() {
        sessions.remove(&adventure_id);
        info!(%adventure_id, "evicted session from memory");
    }
}

/// Maps in display order, recomputed from the live session.
pub(crate) fn ordered_maps(session: &SessionState) -> Vec<MapRecord> {
    let mut maps: Vec<MapRecord> = session.maps.values().cloned().collect();
    maps.sort_by_key(|m| (m.position, m.id));
    maps
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all clients in a session, optionally excluding one.
pub async fn broadcast(state: &AppState, adventure_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let sessions = state.sessions.read().await;
    let Some(session) = sessions.get(&adventure_id) else {
        return;
    };

    for (client_id, client) in &session.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = client.tx.try_send(frame.clone());
    }
}

// =============================================================================
// HYDRATION
// =============================================================================

/// Look up the adventure's `active_map_id`. Outer `None` means the
/// adventure row itself does not exist.
async fn fetch_active_map_id(pool: &PgPool, adventure_id: Uuid) -> Result<Option<Option<Uuid>>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<Uuid>>("SELECT active_map_id FROM adventures WHERE id = $1")
        .bind(adventure_id)
        .fetch_optional(pool)
        .await
}

async fn hydrate_maps(pool: &PgPool, adventure_id: Uuid) -> Result<HashMap<Uuid, MapRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MapRecord>(
        "SELECT id, adventure_id, name, background_url, background_w, background_h, \
                mask_data, mask_format, mask_w, mask_h, \
                view_zoom, view_pan_x, view_pan_y, view_font_size, \
                battlegrid, layers, position \
         FROM maps WHERE adventure_id = $1",
    )
    .bind(adventure_id)
    .fetch_all(pool)
    .await?;

    let mut maps = HashMap::new();
    for map in rows {
        maps.insert(map.id, map);
    }
    Ok(maps)
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
