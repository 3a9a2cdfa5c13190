//! WebSocket message dispatch
//!
//! Maps each client message onto an engine call. Engine events travel back
//! through the broadcast sink; the only direct replies produced here are
//! error reports for calls that failed outright.

use crate::error::EngineError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::ws::ConnState;
use crate::ServerState;

/// Handle a client message and return an optional direct reply.
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut ConnState,
    state: &ServerState,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::HostSubscribe { room_id } => {
            match state.engine.host_subscribe(&room_id, &conn.addr).await {
                Ok(()) => {
                    conn.current_room = Some(room_id);
                    None
                }
                Err(e) => Some(error_reply(e)),
            }
        }

        ClientMessage::JoinGame {
            room_id,
            name,
            player_id,
        } => {
            match state
                .engine
                .join_room(&room_id, name, &conn.addr, player_id)
                .await
            {
                Ok(_) => {
                    conn.current_room = Some(room_id);
                    None
                }
                Err(e) => Some(error_reply(e)),
            }
        }

        ClientMessage::LeaveRoom { room_id, player_id } => state
            .engine
            .leave_room(&room_id, &player_id)
            .await
            .err()
            .map(error_reply),

        ClientMessage::StartGame { room_id } => state
            .engine
            .start_game(&room_id)
            .await
            .err()
            .map(error_reply),

        ClientMessage::StartVote { room_id } => state
            .engine
            .start_vote(&room_id)
            .await
            .err()
            .map(error_reply),

        ClientMessage::CastVote {
            room_id,
            voter_id,
            target_id,
        } => state
            .engine
            .cast_vote(&room_id, &voter_id, &target_id)
            .await
            .err()
            .map(error_reply),

        ClientMessage::BlankGuessSubmit {
            room_id,
            player_id,
            guess,
        } => state
            .engine
            .submit_blank_guess(&room_id, &player_id, &guess)
            .await
            .err()
            .map(error_reply),

        ClientMessage::RestartGame {
            room_id,
            keep_players,
        } => state
            .engine
            .restart_game(&room_id, keep_players)
            .await
            .err()
            .map(error_reply),
    }
}

fn error_reply(e: EngineError) -> ServerMessage {
    match e {
        EngineError::RoomNotFound => ServerMessage::RoomNotFound,
        e => ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        },
    }
}
