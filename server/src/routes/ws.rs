//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! The socket is bound to one adventure and one role at upgrade time, via the
//! ticket minted over REST. After that, a `select!` loop runs:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Broadcast frames from session peers → forward to client
//!
//! Handler functions are pure business logic — they validate, call a service,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! the terminal reply to the sender and the `Item` broadcast to peers. By the
//! time a broadcast goes out, the service has already persisted the change.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (ticket redeemed) → send `session:connected` with `client_id`
//! 2. Client sends `session:join` → snapshot reply, registered for broadcasts
//! 3. Host mutations → service persists → Done to host, Item to observers
//! 4. Close → broadcast `session:part` → cleanup

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use canvas::consts::DEFAULT_LABEL_FONT_SIZE;
use canvas::fit::ObserverView;
use frames::{Data, FRAME_CODE, FRAME_MESSAGE, Frame, Status, decode_frame, encode_frame};

use crate::services;
use crate::state::{AppState, MapRecord, Role};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Done+data to the sender; the same data as an `Item` to all peers.
    Broadcast(Data),
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let Some((adventure_id, role)) = services::session::redeem_ticket(&state, ticket).await else {
        return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response();
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, adventure_id, role))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, adventure_id: Uuid, role: Role) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    let welcome = Frame::request("session:connected", Data::new())
        .with_session_id(adventure_id)
        .with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, %adventure_id, role = role.as_str(), "ws: client connected");

    // Whether session:join has completed for this connection.
    let mut joined = false;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(
                            &state, adventure_id, role, &mut joined, client_id, &client_tx, &text,
                        )
                        .await;
                        for frame in replies {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Broadcast session:part to peers BEFORE cleanup (part may evict state).
    if joined {
        let mut part = Frame::request("session:part", Data::new())
            .with_session_id(adventure_id)
            .with_data("client_id", client_id.to_string());
        part.status = Status::Item;
        services::session::broadcast(&state, adventure_id, &part, Some(client_id)).await;
        services::session::part_session(&state, adventure_id, client_id).await;
    }
    info!(%client_id, %adventure_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch, role enforcement, and broadcast fan-out
/// end-to-end without a socket.
async fn process_inbound_text(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: &mut bool,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req = match decode_frame(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new())
                .with_data("message", format!("invalid frame: {e}"));
            return vec![err];
        }
    };

    // The socket is bound to one adventure; the client cannot pick another.
    req.session_id = Some(adventure_id);
    req.from = Some(client_id.to_string());

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    let prefix = req.prefix();
    let result = match prefix {
        "session" => handle_session(state, adventure_id, role, joined, client_id, client_tx, &req).await,
        "mask" => handle_mask(state, adventure_id, role, *joined, &req).await,
        "view" => handle_view(state, adventure_id, role, *joined, &req).await,
        "map" => handle_map(state, adventure_id, role, *joined, &req).await,
        "layer" => handle_layer(state, adventure_id, role, *joined, &req).await,
        "turn" => handle_turn(state, adventure_id, role, *joined, &req).await,
        "grid" => handle_grid(state, adventure_id, role, *joined, &req).await,
        "overlay" => handle_overlay(role, *joined, &req),
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    match result {
        Ok(Outcome::Broadcast(data)) => {
            let sender_frame = req.done(data);
            // Peers get an Item without parent_id (they didn't originate it).
            let mut peer_frame = sender_frame.clone();
            peer_frame.id = Uuid::new_v4();
            peer_frame.parent_id = None;
            peer_frame.status = Status::Item;
            services::session::broadcast(state, adventure_id, &peer_frame, Some(client_id)).await;
            vec![sender_frame]
        }
        Ok(Outcome::Reply(data)) => {
            vec![req.done(data)]
        }
        Ok(Outcome::Done) => {
            vec![req.done(Data::new())]
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// GUARDS & EXTRACTORS
// =============================================================================

fn require_host(joined: bool, role: Role, req: &Frame) -> Result<(), Frame> {
    if !joined {
        return Err(req.error("must join the session first"));
    }
    if role != Role::Host {
        return Err(req.error("host role required"));
    }
    Ok(())
}

fn require_map_id(req: &Frame) -> Result<Uuid, Frame> {
    req.data
        .get("map_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| req.error("map_id required"))
}

fn op_of(req: &Frame) -> &str {
    req.syscall.split_once(':').map_or("", |(_, op)| op)
}

fn json_dim(data: &Data, key: &str) -> i32 {
    data.get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(0)
}

fn map_to_data(map: &MapRecord) -> Data {
    match serde_json::to_value(map) {
        Ok(Value::Object(obj)) => obj.into_iter().collect(),
        _ => Data::new(),
    }
}

fn layers_data(map_id: Uuid, layers: Value) -> Data {
    let mut data = Data::new();
    data.insert("map_id".into(), serde_json::json!(map_id));
    data.insert("layers".into(), layers);
    data
}

// =============================================================================
// SESSION HANDLERS
// =============================================================================

async fn handle_session(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: &mut bool,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match op_of(req) {
        "join" => {
            let result = services::session::join_session(
                state,
                adventure_id,
                client_id,
                role,
                client_tx.clone(),
            )
            .await;
            match result {
                Ok(snapshot) => {
                    *joined = true;

                    let mut reply = Data::new();
                    reply.insert(
                        "maps".into(),
                        serde_json::to_value(&snapshot.maps).unwrap_or_default(),
                    );
                    reply.insert("active_map_id".into(), serde_json::json!(snapshot.active_map_id));
                    reply.insert("role".into(), serde_json::json!(role));
                    Ok(Outcome::Reply(reply))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "activate" => {
            require_host(*joined, role, req)?;
            let map_id = require_map_id(req)?;
            match services::map::set_active(state, adventure_id, map_id).await {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("map_id".into(), serde_json::json!(map_id));
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown session op: {op}"))),
    }
}

// =============================================================================
// MASK / VIEW / GRID HANDLERS
// =============================================================================

async fn handle_mask(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: bool,
    req: &Frame,
) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    match op_of(req) {
        "update" => {
            let map_id = require_map_id(req)?;
            let Some(mask) = req.data.get("mask").and_then(|v| v.as_str()) else {
                return Err(req.error("mask required"));
            };
            let format = req.data.get("format").and_then(|v| v.as_str()).unwrap_or("png");
            let width = json_dim(&req.data, "width");
            let height = json_dim(&req.data, "height");

            let result =
                services::map::update_mask(state, adventure_id, map_id, mask, format, width, height)
                    .await;
            match result {
                Ok(Some(())) => Ok(Outcome::Broadcast(req.data.clone())),
                Ok(None) => Ok(Outcome::Done),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown mask op: {op}"))),
    }
}

async fn handle_view(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: bool,
    req: &Frame,
) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    match op_of(req) {
        "update" => {
            let map_id = require_map_id(req)?;
            let pan = req.data.get("pan");
            let view = ObserverView {
                zoom: req.data.get("zoom").and_then(Value::as_f64).unwrap_or(1.0),
                pan_x: pan.and_then(|p| p.get("x")).and_then(Value::as_f64).unwrap_or(0.0),
                pan_y: pan.and_then(|p| p.get("y")).and_then(Value::as_f64).unwrap_or(0.0),
                label_font_size: req
                    .data
                    .get("font_size")
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(DEFAULT_LABEL_FONT_SIZE),
            };

            match services::map::update_view(state, adventure_id, map_id, &view).await {
                Ok(Some(())) => Ok(Outcome::Broadcast(req.data.clone())),
                Ok(None) => Ok(Outcome::Done),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown view op: {op}"))),
    }
}

async fn handle_grid(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: bool,
    req: &Frame,
) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    match op_of(req) {
        "update" => {
            let map_id = require_map_id(req)?;
            let battlegrid =
                req.data.get("battlegrid").cloned().unwrap_or_else(|| serde_json::json!({}));

            match services::map::update_battlegrid(state, adventure_id, map_id, &battlegrid).await {
                Ok(Some(())) => Ok(Outcome::Broadcast(req.data.clone())),
                Ok(None) => Ok(Outcome::Done),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown grid op: {op}"))),
    }
}

// =============================================================================
// MAP HANDLERS
// =============================================================================

async fn handle_map(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: bool,
    req: &Frame,
) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    match op_of(req) {
        "create" => {
            let name = req.data.get("name").and_then(|v| v.as_str()).unwrap_or("Untitled Map");
            let background_url = req.data.get("background_url").and_then(|v| v.as_str());
            let width = json_dim(&req.data, "width");
            let height = json_dim(&req.data, "height");

            let result =
                services::map::create_map(state, adventure_id, name, background_url, width, height)
                    .await;
            match result {
                Ok(record) => Ok(Outcome::Broadcast(map_to_data(&record))),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "update" => {
            let map_id = require_map_id(req)?;
            let Some(patch) = req.data.get("patch").and_then(Value::as_object) else {
                return Err(req.error("patch required"));
            };
            let patch: Data = patch.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

            match services::map::update_map(state, adventure_id, map_id, &patch).await {
                Ok(record) => Ok(Outcome::Broadcast(map_to_data(&record))),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "delete" => {
            let map_id = require_map_id(req)?;
            match services::map::delete_map(state, adventure_id, map_id).await {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("map_id".into(), serde_json::json!(map_id));
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown map op: {op}"))),
    }
}

// =============================================================================
// LAYER HANDLERS
// =============================================================================

async fn handle_layer(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: bool,
    req: &Frame,
) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    let map_id = require_map_id(req)?;

    let result = match op_of(req) {
        "add" => {
            let Some(layer) = req.data.get("layer").filter(|v| v.is_object()).cloned() else {
                return Err(req.error("layer must be an object"));
            };
            services::layer::add_layer(state, adventure_id, map_id, layer).await
        }
        "update" => {
            let Some(layer_id) = req.data.get("layer_id").and_then(|v| v.as_str()) else {
                return Err(req.error("layer_id required"));
            };
            let Some(patch) = req.data.get("patch").and_then(Value::as_object) else {
                return Err(req.error("patch required"));
            };
            let patch: Data = patch.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            services::layer::update_layer(state, adventure_id, map_id, layer_id, &patch).await
        }
        "delete" => {
            let Some(layer_id) = req.data.get("layer_id").and_then(|v| v.as_str()) else {
                return Err(req.error("layer_id required"));
            };
            services::layer::delete_layer(state, adventure_id, map_id, layer_id).await
        }
        "reorder" => {
            let Some(ids) = req.data.get("layer_ids").and_then(Value::as_array) else {
                return Err(req.error("layer_ids required"));
            };
            let mut ordered = Vec::with_capacity(ids.len());
            for id in ids {
                let Some(id) = id.as_str() else {
                    return Err(req.error("layer_ids must be strings"));
                };
                ordered.push(id.to_string());
            }
            services::layer::reorder(state, adventure_id, map_id, &ordered).await
        }
        op => return Err(req.error(format!("unknown layer op: {op}"))),
    };

    match result {
        Ok(Some(layers)) => Ok(Outcome::Broadcast(layers_data(map_id, layers))),
        Ok(None) => Ok(Outcome::Done),
        Err(e) => Err(req.error_from(&e)),
    }
}

// =============================================================================
// TURN & OVERLAY HANDLERS
// =============================================================================

async fn handle_turn(
    state: &AppState,
    adventure_id: Uuid,
    role: Role,
    joined: bool,
    req: &Frame,
) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    match op_of(req) {
        "update" => {
            let roster = serde_json::json!({
                "entries": req.data.get("entries").cloned().unwrap_or_else(|| serde_json::json!([])),
                "active_id": req.data.get("active_id").cloned().unwrap_or(Value::Null),
            });

            match services::adventure::update_turn_order(&state.pool, adventure_id, &roster).await {
                Ok(()) => Ok(Outcome::Broadcast(req.data.clone())),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown turn op: {op}"))),
    }
}

/// Overlays are ephemeral: relayed to peers, never persisted.
fn handle_overlay(role: Role, joined: bool, req: &Frame) -> Result<Outcome, Frame> {
    require_host(joined, role, req)?;
    match op_of(req) {
        "show" => {
            if req.data.get("kind").and_then(|v| v.as_str()).is_none() {
                return Err(req.error("kind required"));
            }
            Ok(Outcome::Broadcast(req.data.clone()))
        }
        "hide" => Ok(Outcome::Broadcast(req.data.clone())),
        op => Err(req.error(format!("unknown overlay op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = encode_frame(frame);
    if frame.status == Status::Error {
        let code = frame.data.get(FRAME_CODE).and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get(FRAME_MESSAGE).and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
