use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Big-screen / host page subscribes to a room's updates.
    HostSubscribe {
        room_id: RoomId,
    },
    JoinGame {
        room_id: RoomId,
        name: Option<String>,
        /// Present on rejoin; the seat is reclaimed and the transport
        /// address rebound.
        player_id: Option<PlayerId>,
    },
    LeaveRoom {
        room_id: RoomId,
        player_id: PlayerId,
    },
    StartGame {
        room_id: RoomId,
    },
    StartVote {
        room_id: RoomId,
    },
    CastVote {
        room_id: RoomId,
        voter_id: PlayerId,
        target_id: PlayerId,
    },
    BlankGuessSubmit {
        room_id: RoomId,
        player_id: PlayerId,
        guess: String,
    },
    RestartGame {
        room_id: RoomId,
        keep_players: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    SpyWin,
    CivilWin,
    BlankWin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    Tie,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OutReason {
    VotedOut,
    Left,
    BlankGuessFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        player_id: PlayerId,
        room_id: RoomId,
        name: String,
    },
    RoomNotFound,
    UpdateLobby {
        players: Vec<PlayerView>,
        joined: usize,
        total: usize,
        counts: Option<RoleCounts>,
        votes: HashMap<PlayerId, u32>,
        state: RoomState,
    },
    GameStarted {
        players: Vec<PlayerView>,
        counts: RoleCounts,
    },
    YourWord {
        word: String,
    },
    VoteBegin {
        players: Vec<PlayerView>,
    },
    VoteUpdate {
        voter_id: PlayerId,
        target_id: PlayerId,
        votes: HashMap<PlayerId, u32>,
    },
    VotingComplete {
        status: VoteStatus,
        player: Option<PlayerView>,
        counts: RoleCounts,
    },
    GameOver {
        result: GameResult,
        winners: Vec<PlayerView>,
        final_roles: Vec<PlayerView>,
    },
    BlankGuessStart,
    /// Sent to each eligible guesser when a blank-guess round opens.
    BlankGuessPrompt,
    /// Sent to everyone else while a blank-guess round is pending.
    BlankGuessWait,
    BlankGuessEnd {
        counts: RoleCounts,
        state: RoomState,
    },
    YouOut {
        reason: OutReason,
    },
    /// Waiting-pool player is offered a seat in a newly created room.
    RedirectRoom {
        room_id: RoomId,
        name: String,
        player_id: PlayerId,
    },
    /// Waiting-pool player did not fit into the new room.
    KickedWait {
        message: String,
    },
    RoomResetWait,
    RoomResetHost,
    Error {
        code: String,
        msg: String,
    },
}

/// Projection of a player for the audience or the host screen. The audience
/// form withholds role and word entirely; both forms report a pending Blank
/// as still in play.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    pub is_out: bool,
    pub pending_blank: bool,
}

impl PlayerView {
    pub fn host(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            role: p.role,
            word: p.word.clone(),
            is_out: p.is_out && !p.pending_blank,
            pending_blank: p.pending_blank,
        }
    }

    pub fn audience(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            role: None,
            word: None,
            is_out: p.is_out && !p.pending_blank,
            pending_blank: p.pending_blank,
        }
    }
}
