//! Per-room change notifications over WebSocket.
//!
//! The socket is push-only. Every message is a hint to re-fetch the room
//! snapshot; clients that miss one still converge through polling.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::store::{ChangeEvent, ChangeOp, Table};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub room_id: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection request: room={:?}", params.room_id);
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::error!("Failed to serialize {:?}: {}", msg, e);
            Ok(())
        }
    }
}

/// Translate a store event into what the client is told
fn hint_for(event: &ChangeEvent) -> ServerMessage {
    match (event.table, event.op) {
        (Table::Rooms, ChangeOp::Delete) => ServerMessage::RoomDeleted,
        (table, op) => ServerMessage::Changed { table, op },
    }
}

async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the existence check so nothing slips in between
    let mut changes = state.store.subscribe();

    let room_id = match params.room_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            let error = ServerMessage::Error {
                code: "INVALID_INPUT".to_string(),
                msg: "roomId is required".to_string(),
            };
            let _ = send_json(&mut sender, &error).await;
            return;
        }
    };

    match state.store.get_room(&room_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let _ = send_json(&mut sender, &ServerMessage::RoomDeleted).await;
            return;
        }
        Err(e) => {
            tracing::error!("WebSocket room lookup failed: {}", e);
            let error = ServerMessage::Error {
                code: "STORAGE_FAILURE".to_string(),
                msg: e.to_string(),
            };
            let _ = send_json(&mut sender, &error).await;
            return;
        }
    }

    let welcome = ServerMessage::Welcome {
        room_id: room_id.clone(),
        poll_interval_ms: state.config.poll_interval_ms,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if send_json(&mut sender, &welcome).await.is_err() {
        tracing::error!("Failed to send welcome message");
        return;
    }

    tracing::debug!("WebSocket subscribed to room {}", room_id);

    loop {
        tokio::select! {
            event = changes.recv() => {
                let msg = match event {
                    Ok(event) if event.room_id == room_id => hint_for(&event),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("WebSocket for room {} lagged, {} events dropped", room_id, missed);
                        ServerMessage::Resync
                    }
                    Err(RecvError::Closed) => break,
                };
                let deleted = msg == ServerMessage::RoomDeleted;
                if send_json(&mut sender, &msg).await.is_err() || deleted {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Ignoring client message: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::debug!("WebSocket closed for room {}", room_id);
}
