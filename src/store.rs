use crate::types::Room;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Best-effort room snapshot persistence. `save` is an idempotent full-state
/// overwrite invoked after every committed transition; failures are logged
/// by the caller and never block in-memory progress.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, room: &Room) -> Result<(), StoreError>;
    async fn delete(&self, room_id: &str) -> Result<(), StoreError>;
}

/// Writes each room to `<dir>/<room_id>.json`.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, room_id: &str) -> PathBuf {
        self.dir.join(format!("{room_id}.json"))
    }
}

#[async_trait]
impl SnapshotStore for JsonStore {
    async fn save(&self, room: &Room) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(room)?;
        tokio::fs::write(self.path_for(&room.id), json).await?;
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(room_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, room_id: &str) -> Option<Room> {
        self.rooms.read().await.get(room_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, room: &Room) -> Result<(), StoreError> {
        self.rooms
            .write()
            .await
            .insert(room.id.clone(), room.clone());
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        self.rooms.write().await.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RoomConfig;

    fn sample_room(id: &str) -> Room {
        Room::new(
            id.to_string(),
            RoomConfig {
                total_players: 5,
                spy_count: 1,
                blank_count: 1,
                category: None,
            },
        )
    }

    #[tokio::test]
    async fn json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        let room = sample_room("AB12CD");
        store.save(&room).await.unwrap();

        let raw = tokio::fs::read(dir.path().join("AB12CD.json")).await.unwrap();
        let loaded: Room = serde_json::from_slice(&raw).unwrap();
        assert_eq!(loaded, room);

        store.delete("AB12CD").await.unwrap();
        assert!(!dir.path().join("AB12CD.json").exists());
    }

    #[tokio::test]
    async fn json_store_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        store.delete("MISSING").await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let store = MemoryStore::new();
        let mut room = sample_room("R1");
        store.save(&room).await.unwrap();

        room.state = crate::types::RoomState::Gaming;
        store.save(&room).await.unwrap();

        let loaded = store.get("R1").await.unwrap();
        assert_eq!(loaded.state, crate::types::RoomState::Gaming);
        assert_eq!(store.len().await, 1);
    }
}
