//! InMemory Room Directory 実装
//!
//! ドメイン層が定義する RoomDirectory trait の具体的な実装。
//! BTreeMap をインメモリ DB として使用します（一覧はルーム ID 順）。

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{RepositoryError, RoomDirectory, RoomId, RoomInfo};

/// インメモリ Room Directory 実装
#[derive(Default)]
pub struct InMemoryRoomDirectory {
    rooms: RwLock<BTreeMap<RoomId, RoomInfo>>,
}

impl InMemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 起動時に与えられたルーム一覧から作成
    pub fn with_rooms(rooms: impl IntoIterator<Item = RoomInfo>) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|room| (room.id.clone(), room))
            .collect();
        Self {
            rooms: RwLock::new(rooms),
        }
    }
}

#[async_trait]
impl RoomDirectory for InMemoryRoomDirectory {
    async fn get_room(&self, id: &RoomId) -> Result<RoomInfo, RepositoryError> {
        let rooms = self.rooms.read().await;
        rooms
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::RoomNotFound(id.as_str().to_string()))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.values().cloned().collect())
    }
}
