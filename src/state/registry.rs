use super::{AppState, Events};
use crate::broadcast::Recipient;
use crate::error::EngineError;
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.total_players < 3 {
            return Err(EngineError::ConfigInvalid(
                "at least 3 players required".to_string(),
            ));
        }
        let half = self.total_players / 2;
        if self.spy_count < 1 || self.spy_count > half {
            return Err(EngineError::ConfigInvalid(format!(
                "spy count must be between 1 and {half}"
            )));
        }
        if self.blank_count > half - self.spy_count {
            return Err(EngineError::ConfigInvalid(format!(
                "blank count must be at most {}",
                half - self.spy_count
            )));
        }
        Ok(())
    }
}

impl AppState {
    /// Create a room with a validated configuration and a fresh short code,
    /// then offer seats to players parked in the waiting pool.
    pub async fn create_room(&self, config: RoomConfig) -> Result<RoomId, EngineError> {
        config.validate()?;

        let mut rooms = self.rooms.write().await;
        let room_id = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
            // Collision - try again
        };

        let room = Room::new(room_id.clone(), config);
        rooms.insert(room_id.clone(), Arc::new(Mutex::new(room.clone())));
        drop(rooms);

        let events = self.attach_waiting_players(&room).await;
        tracing::info!(
            room_id = %room_id,
            players = room.config.total_players,
            spies = room.config.spy_count,
            blanks = room.config.blank_count,
            category = room.config.category.as_deref().unwrap_or("all"),
            "room created"
        );
        self.commit(Some(room), events).await;
        Ok(room_id)
    }

    /// Offer the new room to waiting-pool players: up to `total_players - 1`
    /// seats (one is always left open so the room cannot auto-start under
    /// its creator), shuffled; the overflow is notified and dropped.
    async fn attach_waiting_players(&self, room: &Room) -> Events {
        let mut waiting = self.waiting.write().await;
        if waiting.is_empty() {
            return Vec::new();
        }

        let mut pool: Vec<WaitingPlayer> = waiting.drain().map(|(_, w)| w).collect();
        pool.shuffle(&mut rand::rng());

        let allow = room.config.total_players.saturating_sub(1);
        let mut events = Vec::new();
        for (i, w) in pool.into_iter().enumerate() {
            if i < allow {
                events.push((
                    Recipient::Player(w.addr),
                    ServerMessage::RedirectRoom {
                        room_id: room.id.clone(),
                        name: w.name,
                        player_id: w.player_id,
                    },
                ));
            } else {
                events.push((
                    Recipient::Player(w.addr),
                    ServerMessage::KickedWait {
                        message: "room full, please rejoin later".to_string(),
                    },
                ));
            }
        }
        events
    }

    /// Subscribe an observer endpoint (host / big screen) to a room. The
    /// subscriber immediately receives the host-view lobby state.
    pub async fn host_subscribe(&self, room_id: &str, addr: &str) -> Result<(), EngineError> {
        let room = self.room(room_id).await?;

        let mut observers = self.observers.write().await;
        let viewers = observers.entry(room_id.to_string()).or_default();
        viewers.insert(addr.to_string());
        let viewer_count = viewers.len();
        drop(observers);

        let msg = {
            let room = room.lock().await;
            Self::host_lobby_msg(&room)
        };

        tracing::debug!(room_id, viewers = viewer_count, "observer subscribed");
        self.commit(None, vec![(Recipient::Player(addr.to_string()), msg)])
            .await;
        Ok(())
    }

    /// Transport endpoint went away. A player's seat is never vacated by
    /// this (only an explicit leave eliminates), but observer tracking is
    /// updated and a room left with zero observers is torn down entirely.
    pub async fn disconnect(&self, addr: &str) {
        self.waiting.write().await.remove(addr);

        let emptied: Vec<RoomId> = {
            let mut observers = self.observers.write().await;
            let mut emptied = Vec::new();
            for (room_id, viewers) in observers.iter_mut() {
                if viewers.remove(addr) && viewers.is_empty() {
                    emptied.push(room_id.clone());
                }
            }
            for room_id in &emptied {
                observers.remove(room_id);
            }
            emptied
        };

        for room_id in emptied {
            self.teardown_room(&room_id).await;
        }
    }

    /// Drop a room and release everything tied to it.
    pub(crate) async fn teardown_room(&self, room_id: &str) {
        self.rooms.write().await.remove(room_id);
        self.observers.write().await.remove(room_id);
        if let Err(e) = self.store.delete(room_id).await {
            tracing::warn!(room_id, error = %e, "room snapshot delete failed");
        }
        tracing::info!(room_id, "room removed");
    }
}
