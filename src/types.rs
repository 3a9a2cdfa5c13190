use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opaque ID types for type safety
pub type RoomId = String;
pub type PlayerId = String;
pub type QuestionId = String;
/// Transport endpoint address. Changes on reconnect; player ids do not.
pub type Address = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    Blank,
    Spy,
    Civilian,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    Lobby,
    Gaming,
    Voting,
    BlankGuess,
    Finished,
}

/// Room configuration, fixed at creation for the room's whole life.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomConfig {
    pub total_players: usize,
    pub spy_count: usize,
    pub blank_count: usize,
    /// Question category; `None` draws from the full pool.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub category: String,
    pub word_a: String,
    pub word_b: String,
}

/// Which side of the current question pair went to which camp.
/// Decided by a fair coin flip each game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordAssignment {
    pub civilian_word: String,
    pub spy_word: String,
}

/// Entry in a room's question history log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub category: String,
    pub word_a: String,
    pub word_b: String,
    pub used_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    /// Current transport address. Rebound on rejoin, never used as identity.
    pub addr: Address,
    pub name: String,
    pub role: Option<Role>,
    /// Assigned word. `Some("")` for a Blank once the game has started.
    pub word: Option<String>,
    pub is_out: bool,
    /// Eliminated Blank awaiting their guess opportunity. Excluded from alive
    /// counts but still shown as in play to the audience.
    pub pending_blank: bool,
    /// Target of this player's vote in the active round.
    pub vote: Option<PlayerId>,
}

impl Player {
    pub fn new(id: PlayerId, addr: Address, name: String) -> Self {
        Self {
            id,
            addr,
            name,
            role: None,
            word: None,
            is_out: false,
            pending_blank: false,
            vote: None,
        }
    }

    pub fn alive(&self) -> bool {
        !self.is_out
    }
}

/// Survivor counts by role, the input to end-game evaluation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleCounts {
    pub spies: usize,
    pub blanks: usize,
    pub civilians: usize,
}

/// One voting round: per-target counts plus the set of voters who already
/// cast, enforcing at most one vote per voter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoteRound {
    pub counts: HashMap<PlayerId, u32>,
    pub voters: HashSet<PlayerId>,
}

/// The blank-guess mini-game. The eligible set is frozen at round start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlankGuessRound {
    pub eligible: Vec<PlayerId>,
    pub answers: HashMap<PlayerId, String>,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub config: RoomConfig,
    pub state: RoomState,
    pub question: Option<Question>,
    pub words: Option<WordAssignment>,
    pub players: Vec<Player>,
    pub votes: VoteRound,
    pub blank_guess: Option<BlankGuessRound>,
    pub used_question_ids: HashSet<QuestionId>,
    pub question_history: Vec<QuestionRecord>,
    pub created_at: String,
}

impl Room {
    pub fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            id,
            config,
            state: RoomState::Lobby,
            question: None,
            words: None,
            players: Vec::new(),
            votes: VoteRound::default(),
            blank_guess: None,
            used_question_ids: HashSet::new(),
            question_history: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive())
    }

    pub fn alive_counts(&self) -> RoleCounts {
        let mut counts = RoleCounts::default();
        for p in self.alive_players() {
            match p.role {
                Some(Role::Spy) => counts.spies += 1,
                Some(Role::Blank) => counts.blanks += 1,
                Some(Role::Civilian) => counts.civilians += 1,
                None => {}
            }
        }
        counts
    }

    /// Seats counted as occupied for the audience: alive players plus any
    /// pending Blank still awaiting their guess.
    pub fn joined_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| !p.is_out || p.pending_blank)
            .count()
    }
}

/// Player displaced by a full room reset, parked until the next room opens.
#[derive(Debug, Clone)]
pub struct WaitingPlayer {
    pub addr: Address,
    pub name: String,
    pub player_id: PlayerId,
}
