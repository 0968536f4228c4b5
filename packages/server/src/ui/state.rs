//! Server state shared by every handler.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{MessageStore, RoomDirectory},
    usecase::{BroadcastEngine, ConnectionLifecycle},
};

/// Per-connection transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// 死活監視（Ping）の送信間隔
    pub ping_interval: Duration,
    /// 受信の期限。相手からフレーム（Pong を含む）を受信するたびに延長される
    pub read_timeout: Duration,
    /// 1 回の送信の期限
    pub write_timeout: Duration,
    /// 受信フレームの最大バイト数
    pub max_frame_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_frame_bytes: 4096,
        }
    }
}

/// Shared application state
pub struct AppState {
    /// 接続ライフサイクル（Broadcast Engine と外部コラボレータを保持）
    pub lifecycle: ConnectionLifecycle,
    pub settings: ConnectionSettings,
}

impl AppState {
    pub fn new(lifecycle: ConnectionLifecycle, settings: ConnectionSettings) -> Self {
        Self {
            lifecycle,
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<BroadcastEngine> {
        self.lifecycle.engine()
    }

    pub fn rooms(&self) -> &Arc<dyn RoomDirectory> {
        self.lifecycle.rooms()
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        self.lifecycle.store()
    }
}
