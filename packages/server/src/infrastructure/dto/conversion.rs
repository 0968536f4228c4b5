//! Conversion logic between DTOs and domain types.

use crate::domain::{ClientCommand, Connection, RoomId};
use crate::infrastructure::dto::{
    http::MemberDto,
    websocket::{MessageType, WireEnvelope},
};
use hiroba_shared::time::timestamp_to_rfc3339;

// ========================================
// DTO → Domain
// ========================================

impl ClientCommand {
    /// Decode an inbound text frame.
    ///
    /// Anything that is not a well-formed control envelope is plain chat and
    /// keeps the raw frame text: unparsable JSON, unknown or absent `type`,
    /// and `join_room` / `private` without a `target`.
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str::<WireEnvelope>(text) {
            Ok(envelope) => Self::from_envelope(envelope, text),
            Err(e) => {
                tracing::debug!("Frame is not a wire envelope, treating as chat: {}", e);
                Self::chat(text)
            }
        }
    }

    fn from_envelope(envelope: WireEnvelope, raw: &str) -> Self {
        let target = envelope.target.filter(|target| !target.trim().is_empty());
        match (envelope.r#type, target) {
            (Some(MessageType::JoinRoom), Some(target)) => match RoomId::new(target) {
                Ok(target) => Self::JoinRoom { target },
                Err(_) => Self::chat(raw),
            },
            (Some(MessageType::LeaveRoom), _) => Self::LeaveRoom,
            (Some(MessageType::Private), Some(target)) => Self::Private {
                target,
                content: envelope.content,
            },
            _ => Self::chat(raw),
        }
    }

    fn chat(raw: &str) -> Self {
        Self::Chat {
            raw: raw.to_string(),
        }
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<&Connection> for MemberDto {
    fn from(connection: &Connection) -> Self {
        Self {
            connection_id: connection.id().as_str().to_string(),
            display_name: connection.display_name(),
            room: connection.room().map(RoomId::into_string),
            active: connection.is_active(),
            joined_at: timestamp_to_rfc3339(connection.joined_at()),
            last_active: timestamp_to_rfc3339(connection.last_active()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_join_room() {
        // テスト項目: join_room フレームが JoinRoom コマンドにデコードされる
        // given (前提条件):
        let text = r#"{"type":"join_room","target":"lobby"}"#;

        // when (操作):
        let command = ClientCommand::decode(text);

        // then (期待する結果):
        assert_eq!(
            command,
            ClientCommand::JoinRoom {
                target: RoomId::try_from("lobby").unwrap()
            }
        );
    }

    #[test]
    fn test_decode_leave_room_without_target() {
        // テスト項目: leave_room は target がなくても LeaveRoom になる
        // given (前提条件):
        let text = r#"{"type":"leave_room"}"#;

        // when (操作):
        let command = ClientCommand::decode(text);

        // then (期待する結果):
        assert_eq!(command, ClientCommand::LeaveRoom);
    }

    #[test]
    fn test_decode_private() {
        // テスト項目: private フレームが宛先と本文を持つ Private コマンドになる
        // given (前提条件):
        let text = r#"{"type":"private","target":"conn-1","content":"psst","time":5}"#;

        // when (操作):
        let command = ClientCommand::decode(text);

        // then (期待する結果):
        assert_eq!(
            command,
            ClientCommand::Private {
                target: "conn-1".to_string(),
                content: "psst".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_falls_back_to_chat() {
        // テスト項目: 制御メッセージとして解釈できないフレームは生テキストのままチャットになる
        // given (前提条件):
        let frames = [
            "hello world",
            r#"{"content":"plain"}"#,
            r#"{"type":"join_room","target":"  "}"#,
            r#"{"type":"private","content":"no target"}"#,
            r#"{"type":"dance","content":"unknown"}"#,
        ];

        for text in frames {
            // when (操作):
            let command = ClientCommand::decode(text);

            // then (期待する結果):
            assert_eq!(
                command,
                ClientCommand::Chat {
                    raw: text.to_string()
                },
                "frame: {}",
                text
            );
        }
    }
}
