pub mod blank;
pub mod endgame;
pub mod registry;
pub mod roles;
pub mod room;
pub mod vote;

use crate::broadcast::{BroadcastSink, Recipient};
use crate::error::EngineError;
use crate::protocol::{PlayerView, ServerMessage};
use crate::questions::QuestionProvider;
use crate::store::SnapshotStore;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outbound events collected during a transition, emitted only after the
/// room lock is released.
pub(crate) type Events = Vec<(Recipient, ServerMessage)>;

/// Shared engine state: the room registry plus the injected collaborators.
///
/// Every room lives behind its own `Mutex`, so all transitions for one room
/// are serialized while independent rooms proceed in parallel. A transition
/// computes its full effect and collects its events under the room lock,
/// then persists and emits after releasing it; slow storage can never stall
/// gameplay.
pub struct AppState {
    pub(crate) rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>,
    /// Players displaced by a full reset, keyed by their previous transport
    /// address, waiting to be pulled into the next created room.
    pub(crate) waiting: RwLock<HashMap<Address, WaitingPlayer>>,
    /// Subscribed observer endpoints per room; a room with none left is
    /// torn down.
    pub(crate) observers: RwLock<HashMap<RoomId, HashSet<Address>>>,
    pub(crate) questions: Arc<dyn QuestionProvider>,
    pub(crate) store: Arc<dyn SnapshotStore>,
    pub(crate) sink: Arc<dyn BroadcastSink>,
}

impl AppState {
    pub fn new(
        questions: Arc<dyn QuestionProvider>,
        store: Arc<dyn SnapshotStore>,
        sink: Arc<dyn BroadcastSink>,
    ) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            waiting: RwLock::new(HashMap::new()),
            observers: RwLock::new(HashMap::new()),
            questions,
            store,
            sink,
        }
    }

    pub(crate) async fn room(&self, room_id: &str) -> Result<Arc<Mutex<Room>>, EngineError> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or(EngineError::RoomNotFound)
    }

    /// Clone of a room's current state, for the HTTP surface and tests.
    pub async fn room_snapshot(&self, room_id: &str) -> Option<Room> {
        let room = self.rooms.read().await.get(room_id).cloned()?;
        let room = room.lock().await;
        Some(room.clone())
    }

    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }

    pub async fn waiting_count(&self) -> usize {
        self.waiting.read().await.len()
    }

    pub(crate) async fn observers_of(&self, room_id: &str) -> Vec<Address> {
        self.observers
            .read()
            .await
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Persist a committed transition and deliver its events, in that order.
    /// Persistence is best-effort: a failed save is logged and the events
    /// still go out.
    pub(crate) async fn commit(&self, snapshot: Option<Room>, events: Events) {
        if let Some(room) = snapshot {
            if let Err(e) = self.store.save(&room).await {
                tracing::warn!(room_id = %room.id, error = %e, "room snapshot save failed");
            }
        }
        for (to, msg) in events {
            self.sink.emit(to, msg);
        }
    }

    /// Host-view lobby payload: roles and words visible.
    pub(crate) fn host_lobby_msg(room: &Room) -> ServerMessage {
        Self::lobby_msg(room, PlayerView::host)
    }

    /// Audience-view lobby payload: roles and words withheld.
    pub(crate) fn audience_lobby_msg(room: &Room) -> ServerMessage {
        Self::lobby_msg(room, PlayerView::audience)
    }

    fn lobby_msg(room: &Room, view: fn(&Player) -> PlayerView) -> ServerMessage {
        ServerMessage::UpdateLobby {
            players: room.players.iter().map(view).collect(),
            joined: room.joined_count(),
            total: room.config.total_players,
            counts: (room.state != RoomState::Lobby).then(|| room.alive_counts()),
            votes: room.votes.counts.clone(),
            state: room.state,
        }
    }

    /// Lobby updates for one room: the host form to each subscribed
    /// observer, the audience form to the room at large. Both mask a
    /// pending Blank as still in play.
    pub(crate) fn lobby_events(&self, room: &Room, observers: &[Address], events: &mut Events) {
        for addr in observers {
            events.push((Recipient::Player(addr.clone()), Self::host_lobby_msg(room)));
        }
        events.push((
            Recipient::Room(room.id.clone()),
            Self::audience_lobby_msg(room),
        ));
    }
}
