//! InMemory Message Store 実装
//!
//! ルームごとに VecDeque で保持し、保持件数を超えたら古いものから捨てます。

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use hiroba_shared::time::{Clock, SystemClock};

use crate::domain::{MessageStore, RepositoryError, RoomId, StoredMessage};

/// Default number of messages retained per room.
pub const DEFAULT_RETENTION: usize = 1000;

/// インメモリ Message Store 実装
pub struct InMemoryMessageStore {
    messages: Mutex<HashMap<RoomId, VecDeque<StoredMessage>>>,
    retention: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            retention: retention.max(1),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_message(
        &self,
        room_id: &RoomId,
        user_id: &str,
        content: &str,
        is_system: bool,
    ) -> Result<(), RepositoryError> {
        let message = StoredMessage {
            room_id: room_id.clone(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            is_system,
            created_at: self.clock.now_unix_secs(),
        };

        let mut messages = self.messages.lock().await;
        let room = messages.entry(room_id.clone()).or_default();
        room.push_back(message);
        while room.len() > self.retention {
            room.pop_front();
        }
        Ok(())
    }

    async fn list_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let messages = self.messages.lock().await;
        let Some(room) = messages.get(room_id) else {
            return Ok(Vec::new());
        };
        let skip = room.len().saturating_sub(limit);
        Ok(room.iter().skip(skip).cloned().collect())
    }
}
