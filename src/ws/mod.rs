pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast;

use crate::broadcast::{Envelope, Recipient};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::{Address, RoomId};
use crate::ServerState;

/// Per-connection state. The address identifies this transport endpoint for
/// the lifetime of the socket; a player who reconnects gets a fresh one and
/// reclaims their seat by player id instead.
pub struct ConnState {
    pub addr: Address,
    /// Room whose broadcasts this connection receives. Set on a successful
    /// join or host subscribe.
    pub current_room: Option<RoomId>,
}

impl ConnState {
    fn new() -> Self {
        Self {
            addr: ulid::Ulid::new().to_string(),
            current_room: None,
        }
    }

    fn wants(&self, env: &Envelope) -> bool {
        match &env.to {
            Recipient::Room(id) => self.current_room.as_deref() == Some(id.as_str()),
            Recipient::Player(addr) => *addr == self.addr,
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (mut sender, mut receiver) = socket.split();
    let mut conn = ConnState::new();
    let mut events_rx = state.sink.subscribe();

    tracing::info!(addr = %conn.addr, "WebSocket connected");

    loop {
        tokio::select! {
            // Forward engine events addressed to this connection
            env = events_rx.recv() => {
                match env {
                    Ok(env) if conn.wants(&env) => {
                        if let Ok(json) = serde_json::to_string(&env.msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(addr = %conn.addr, skipped, "event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(addr = %conn.addr, "received message: {}", text);

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &mut conn, &state).await
                                {
                                    if let Ok(json) = serde_json::to_string(&response) {
                                        if sender.send(Message::Text(json.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse client message: {}", e);
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if let Ok(json) = serde_json::to_string(&error) {
                                    let _ = sender.send(Message::Text(json.into())).await;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(addr = %conn.addr, "WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(addr = %conn.addr, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.engine.disconnect(&conn.addr).await;
    tracing::info!(addr = %conn.addr, "WebSocket connection closed");
}
