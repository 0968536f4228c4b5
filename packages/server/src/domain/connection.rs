//! Connection entity
//!
//! ## 責務
//!
//! - 1 本のトランスポートセッション（WebSocket など）の状態を保持
//! - 送信側（`ConnectionSink`）への書き込みを接続ごとのロックで直列化
//!
//! ## 並行性
//!
//! `Connection` は `Arc` で共有され、自分の読み取りループ、他の接続からの
//! ブロードキャスト、ダイレクトメッセージ、死活監視タスクから同時に参照されます。
//! トランスポートへの書き込みは必ず `sink` の Mutex を通るため、
//! 同一トランスポートへの並行書き込みは発生しません。
//! メタデータ（表示名・ルーム）は書き込みロックとは別の短いロックで保護します。

use std::{
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use hiroba_shared::time::get_unix_timestamp;

use super::value_object::{ConnectionId, RoomId};

/// Default outbound write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport write errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("transport is closed")]
    Closed,

    #[error("write deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound half of a transport.
///
/// Implementations are never called concurrently: `Connection` owns the sink
/// behind its write lock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionSink: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), SinkError>;

    /// Write one keep-alive ping.
    async fn send_ping(&mut self) -> Result<(), SinkError>;

    /// Close the transport.
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// One live transport session.
pub struct Connection {
    id: ConnectionId,
    display_name: RwLock<Option<String>>,
    room: RwLock<Option<RoomId>>,
    active: AtomicBool,
    joined_at: i64,
    last_active: AtomicI64,
    write_timeout: Duration,
    sink: Mutex<Box<dyn ConnectionSink>>,
}

impl Connection {
    /// Create an active connection with no display name and no room.
    pub fn new(id: ConnectionId, sink: Box<dyn ConnectionSink>) -> Self {
        let now = get_unix_timestamp();
        Self {
            id,
            display_name: RwLock::new(None),
            room: RwLock::new(None),
            active: AtomicBool::new(true),
            joined_at: now,
            last_active: AtomicI64::new(now),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            sink: Mutex::new(sink),
        }
    }

    /// Set the display name. Blank names are treated as unset.
    pub fn with_display_name(self, display_name: Option<String>) -> Self {
        self.set_display_name(display_name);
        self
    }

    pub fn with_room(self, room: Option<RoomId>) -> Self {
        self.set_room(room);
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn display_name(&self) -> Option<String> {
        self.display_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Display name, falling back to the connection id.
    pub fn label(&self) -> String {
        self.display_name()
            .unwrap_or_else(|| self.id.as_str().to_string())
    }

    pub fn set_display_name(&self, display_name: Option<String>) {
        let display_name = display_name.filter(|name| !name.trim().is_empty());
        *self
            .display_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = display_name;
    }

    pub fn room(&self) -> Option<RoomId> {
        self.room
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_in_room(&self, room: &RoomId) -> bool {
        self.room
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            == Some(room)
    }

    /// Replace the current room, returning the previous one.
    pub fn set_room(&self, room: Option<RoomId>) -> Option<RoomId> {
        let mut current = self.room.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, room)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark the connection inactive. Returns `true` if it was active before.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn joined_at(&self) -> i64 {
        self.joined_at
    }

    pub fn last_active(&self) -> i64 {
        self.last_active.load(Ordering::Relaxed)
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&self) {
        self.last_active
            .fetch_max(get_unix_timestamp(), Ordering::Relaxed);
    }

    /// Write one text frame under the per-connection write lock, bounded by
    /// the write deadline.
    pub async fn send_text(&self, text: String) -> Result<(), SinkError> {
        if !self.is_active() {
            return Err(SinkError::Closed);
        }
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.write_timeout, sink.send_text(text)).await {
            Ok(Ok(())) => {
                self.touch();
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SinkError::Timeout(self.write_timeout)),
        }
    }

    /// Send a keep-alive ping through the same write lock as data frames.
    pub async fn ping(&self) -> Result<(), SinkError> {
        let mut sink = self.sink.lock().await;
        tokio::time::timeout(self.write_timeout, sink.send_ping())
            .await
            .map_err(|_| SinkError::Timeout(self.write_timeout))?
    }

    /// Close the transport. Waits at most one write deadline for an
    /// in-flight write to release the lock.
    pub async fn close(&self) -> Result<(), SinkError> {
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        tokio::time::timeout(self.write_timeout, close)
            .await
            .map_err(|_| SinkError::Timeout(self.write_timeout))?
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("display_name", &self.display_name())
            .field("room", &self.room())
            .field("active", &self.is_active())
            .field("joined_at", &self.joined_at)
            .finish_non_exhaustive()
    }
}
