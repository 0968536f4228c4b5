//! Broadcast Engine
//!
//! ## 責務
//!
//! - メッセージを正しい宛先（全員 / ルーム内 / 1 接続）へ配信
//! - ルームごとの上限付き履歴への記録
//! - 接続単位の書き込み失敗を、その接続の無効化とクローズに変換
//!
//! ## 順序と整合性
//!
//! 履歴への記録は配信ループの開始前に行います。配信中に `history_for` を呼んだ場合、
//! そのメッセージが見えるかどうかは保証しません。
//! 1 つの接続への書き込み失敗が他の接続への配信を中断することはありません。

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Mutex;

use hiroba_shared::time::{Clock, SystemClock};

use crate::{
    domain::{Connection, ConnectionId, LogEntry, RegistryError, RoomId, SinkError, ValidationError},
    infrastructure::{dto::websocket::WireEnvelope, registry::ConnectionRegistry},
};

use super::{
    error::BroadcastError,
    history::{DEFAULT_MAX_LOG_SIZE, MessageHistory},
};

/// Callback invoked once per failed write.
pub type FailureHandler = Arc<dyn Fn(&BroadcastError) + Send + Sync>;

/// System notice announcing that a participant joined a room.
pub fn joined_notice(label: &str) -> String {
    format!("{} joined the room", label)
}

/// System notice announcing that a participant left a room.
pub fn left_notice(label: &str) -> String {
    format!("{} left the room", label)
}

/// Construction-time settings of the engine.
#[derive(Clone)]
pub struct BroadcastConfig {
    pub max_log_size: usize,
    pub on_failure: FailureHandler,
}

impl BroadcastConfig {
    pub fn with_max_log_size(mut self, max_log_size: usize) -> Self {
        self.max_log_size = max_log_size;
        self
    }

    pub fn with_failure_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&BroadcastError) + Send + Sync + 'static,
    {
        self.on_failure = Arc::new(handler);
        self
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            on_failure: Arc::new(|error| tracing::warn!("Delivery failed: {}", error)),
        }
    }
}

/// Fans messages out over a shared `ConnectionRegistry`.
pub struct BroadcastEngine {
    registry: Arc<ConnectionRegistry>,
    history: Mutex<MessageHistory>,
    on_failure: FailureHandler,
    clock: Arc<dyn Clock>,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, config: BroadcastConfig) -> Self {
        Self {
            registry,
            history: Mutex::new(MessageHistory::new(config.max_log_size)),
            on_failure: config.on_failure,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Current time (unix seconds) as seen by the engine.
    pub fn now(&self) -> i64 {
        self.clock.now_unix_secs()
    }

    /// Register a connection. A connection that already has a room announces
    /// itself to that room.
    pub async fn register(&self, connection: Arc<Connection>) -> Result<(), RegistryError> {
        self.registry.add(connection.clone()).await?;

        if let Some(room) = connection.room() {
            let notice = joined_notice(&connection.label());
            if let Err(e) = self.announce_to_room(&room, &notice).await {
                tracing::debug!("Join notice for '{}' not delivered: {}", connection.id(), e);
            }
        }
        Ok(())
    }

    pub async fn unregister(&self, id: &ConnectionId) -> Result<Arc<Connection>, RegistryError> {
        self.registry.remove(id).await
    }

    /// Deliver `payload` to every active connection. Returns the number of
    /// successful deliveries.
    pub async fn broadcast_all(&self, payload: &str) -> Result<usize, BroadcastError> {
        self.broadcast_all_from(None, payload).await
    }

    /// Same as [`broadcast_all`](Self::broadcast_all), recording `sender` in the log.
    pub async fn broadcast_all_from(
        &self,
        sender: Option<String>,
        payload: &str,
    ) -> Result<usize, BroadcastError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let targets = self.registry.list_active().await;
        if targets.is_empty() {
            return Err(BroadcastError::NoActiveConnections);
        }

        self.record(LogEntry::data(payload, None, self.now()).with_sender(sender))
            .await;
        Ok(self.fan_out(&targets, payload).await)
    }

    /// Deliver `payload` to the active members of `room_id`.
    pub async fn broadcast_to_room(
        &self,
        room_id: &str,
        payload: &str,
    ) -> Result<usize, BroadcastError> {
        self.broadcast_to_room_from(room_id, None, payload).await
    }

    /// Same as [`broadcast_to_room`](Self::broadcast_to_room), recording `sender` in the log.
    pub async fn broadcast_to_room_from(
        &self,
        room_id: &str,
        sender: Option<String>,
        payload: &str,
    ) -> Result<usize, BroadcastError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let room = RoomId::new(room_id.to_string())?;

        let entry = LogEntry::data(payload, Some(room.clone()), self.now()).with_sender(sender);
        self.deliver_to_room(&room, entry, payload).await
    }

    /// Deliver a system notice to the active members of `room`. The notice is
    /// logged as a system entry and sent as a `system` envelope.
    pub async fn announce_to_room(
        &self,
        room: &RoomId,
        notice: &str,
    ) -> Result<usize, BroadcastError> {
        if notice.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let entry = LogEntry::system(notice, Some(room.clone()), self.now());
        let frame = WireEnvelope::system(&entry).to_frame()?;
        self.deliver_to_room(room, entry, &frame).await
    }

    /// Log `notice` for `room` and deliver it to the active members other than
    /// `leaving`. Unlike [`announce_to_room`](Self::announce_to_room), the
    /// notice is logged even when nobody is left to receive it.
    pub async fn announce_departure(
        &self,
        room: &RoomId,
        notice: &str,
        leaving: &ConnectionId,
    ) -> Result<usize, BroadcastError> {
        if notice.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let entry = LogEntry::system(notice, Some(room.clone()), self.now());
        let frame = WireEnvelope::system(&entry).to_frame()?;
        self.record(entry).await;

        let targets: Vec<Arc<Connection>> = self
            .registry
            .list_active()
            .await
            .into_iter()
            .filter(|connection| connection.is_in_room(room) && connection.id() != leaving)
            .collect();
        Ok(self.fan_out(&targets, &frame).await)
    }

    /// Write `payload` to exactly one connection.
    pub async fn send_direct(&self, target_id: &str, payload: &str) -> Result<(), BroadcastError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let target_id = ConnectionId::new(target_id.to_string()).map_err(RegistryError::from)?;

        let target = self.registry.get(&target_id).await?;
        if !target.is_active() {
            return Err(BroadcastError::InactiveConnection(
                target_id.as_str().to_string(),
            ));
        }

        match target.send_text(payload.to_string()).await {
            Ok(()) => Ok(()),
            Err(source) => Err(self.handle_failure(&target, source).await),
        }
    }

    /// Copy of the bounded log of a room. An empty id is the global scope.
    pub async fn history_for(&self, room_id: &str) -> Vec<LogEntry> {
        let scope = RoomId::parse_optional(room_id);
        self.history.lock().await.entries(&scope)
    }

    /// Active connections whose room equals `room_id` (empty id: no room).
    pub async fn members_of(&self, room_id: &str) -> Vec<Arc<Connection>> {
        let scope = RoomId::parse_optional(room_id);
        self.registry
            .list_active()
            .await
            .into_iter()
            .filter(|connection| connection.room() == scope)
            .collect()
    }

    /// Drop every registered connection (full-service reset).
    pub async fn reset(&self) {
        self.registry.clear().await;
    }

    async fn deliver_to_room(
        &self,
        room: &RoomId,
        entry: LogEntry,
        frame: &str,
    ) -> Result<usize, BroadcastError> {
        let active = self.registry.list_active().await;
        if active.is_empty() {
            return Err(BroadcastError::NoActiveConnections);
        }

        // Logged before filtering: a room that empties mid-broadcast keeps the message.
        self.record(entry).await;

        let targets: Vec<Arc<Connection>> = active
            .into_iter()
            .filter(|connection| connection.is_in_room(room))
            .collect();
        if targets.is_empty() {
            return Err(BroadcastError::NoActiveConnectionsInRoom(
                room.as_str().to_string(),
            ));
        }

        Ok(self.fan_out(&targets, frame).await)
    }

    async fn record(&self, entry: LogEntry) {
        self.history.lock().await.record(entry);
    }

    async fn fan_out(&self, targets: &[Arc<Connection>], frame: &str) -> usize {
        let writes = targets.iter().map(|connection| async move {
            let result = connection.send_text(frame.to_string()).await;
            (connection, result)
        });

        let mut delivered = 0;
        for (connection, result) in join_all(writes).await {
            match result {
                Ok(()) => delivered += 1,
                Err(source) => {
                    self.handle_failure(connection, source).await;
                }
            }
        }
        tracing::debug!("Delivered to {}/{} connection(s)", delivered, targets.len());
        delivered
    }

    /// Report a failed write, deactivate the connection and close its transport.
    async fn handle_failure(&self, connection: &Connection, source: SinkError) -> BroadcastError {
        let error = BroadcastError::Transport {
            connection_id: connection.id().as_str().to_string(),
            source,
        };
        (self.on_failure)(&error);
        connection.deactivate();
        if let Err(e) = connection.close().await {
            tracing::debug!("Closing '{}' failed: {}", connection.id(), e);
        }
        error
    }
}
