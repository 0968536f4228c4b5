//! WebSocket wire envelope.
//!
//! The same JSON envelope is used in both directions:
//!
//! ```text
//! { "type": "join_room" | "leave_room" | "private" | <absent for plain chat>,
//!   "content": string, "target": string, "sender": string, "time": number }
//! ```
//!
//! Server-originated frames additionally use `system` and `error` types.

use serde::{Deserialize, Serialize};

use crate::domain::LogEntry;

/// Envelope `type` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    JoinRoom,
    LeaveRoom,
    Private,
    System,
    Error,
}

/// JSON envelope of a text frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<MessageType>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

impl WireEnvelope {
    /// System notice for a room (or the global scope).
    pub fn system(entry: &LogEntry) -> Self {
        Self {
            r#type: Some(MessageType::System),
            content: entry.content.clone(),
            target: entry.room.as_ref().map(|room| room.as_str().to_string()),
            sender: None,
            time: Some(entry.timestamp),
        }
    }

    /// Direct message, stamped with the sender and server time.
    pub fn private(content: String, sender: String, time: i64) -> Self {
        Self {
            r#type: Some(MessageType::Private),
            content,
            target: None,
            sender: Some(sender),
            time: Some(time),
        }
    }

    /// Error reported back to the acting connection.
    pub fn error(content: String, time: i64) -> Self {
        Self {
            r#type: Some(MessageType::Error),
            content,
            target: None,
            sender: None,
            time: Some(time),
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
