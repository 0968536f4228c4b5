//! Messages: bounded-log entries and decoded client commands.

use serde::Serialize;

use super::value_object::RoomId;

/// Kind of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Data,
    System,
}

/// One entry of a room-scoped message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub kind: MessageKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// `None` is the global scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    /// Unix seconds
    pub timestamp: i64,
}

impl LogEntry {
    pub fn data(content: impl Into<String>, room: Option<RoomId>, timestamp: i64) -> Self {
        Self {
            kind: MessageKind::Data,
            content: content.into(),
            sender: None,
            room,
            timestamp,
        }
    }

    pub fn system(content: impl Into<String>, room: Option<RoomId>, timestamp: i64) -> Self {
        Self {
            kind: MessageKind::System,
            content: content.into(),
            sender: None,
            room,
            timestamp,
        }
    }

    pub fn with_sender(mut self, sender: Option<String>) -> Self {
        self.sender = sender;
        self
    }
}

/// Inbound client frame, decoded once at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Move into `target`, leaving the current room first.
    JoinRoom { target: RoomId },
    /// Leave the current room (no-op when not in one).
    LeaveRoom,
    /// Direct message to one connection.
    Private { target: String, content: String },
    /// Plain chat: the raw frame text is forwarded unchanged.
    Chat { raw: String },
}
