//! WebSocket を使った ConnectionSink 実装
//!
//! ## 責務
//!
//! - WebSocket の送信側（`SplitSink`）を保持
//! - テキストフレーム・Ping・Close の書き込み
//!
//! ## 設計ノート
//!
//! WebSocket の生成と受信側（`SplitStream`）は UI 層（`ui/handler/websocket.rs`）が持ちます。
//! この実装は送信側だけを受け取り、`Connection` の書き込みロック越しに使われます。

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};

use crate::domain::{ConnectionSink, SinkError};

/// WebSocket の送信側
pub struct WebSocketSink {
    sender: SplitSink<WebSocket, Message>,
    closed: bool,
}

impl WebSocketSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender,
            closed: false,
        }
    }

    async fn write(&mut self, message: Message) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.sender
            .send(message)
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ConnectionSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError> {
        self.write(Message::Text(text.into())).await
    }

    async fn send_ping(&mut self) -> Result<(), SinkError> {
        self.write(Message::Ping(Default::default())).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sender
            .close()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}
