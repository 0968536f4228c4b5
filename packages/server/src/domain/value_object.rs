//! Value objects
//!
//! 識別子を文字列のまま扱わず、生成時に検証済みの型として扱います。

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::error::ValidationError;

/// Opaque connection identifier, stable for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a connection identifier from an arbitrary non-empty string.
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyConnectionId);
        }
        Ok(Self(value))
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ConnectionId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room identifier. Never blank.
///
/// The absence of a room (global scope) is `Option::<RoomId>::None`, so a
/// room literally named `"global"` is an ordinary room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyRoomId);
        }
        Ok(Self(value))
    }

    /// Parse an optional room: blank input means "no room".
    pub fn parse_optional(value: &str) -> Option<Self> {
        Self::new(value.to_string()).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for RoomId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_rejects_blank() {
        // テスト項目: 空白のみの接続 ID は作成できない
        // given (前提条件):
        let value = "   ".to_string();

        // when (操作):
        let result = ConnectionId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValidationError::EmptyConnectionId));
    }

    #[test]
    fn test_generated_connection_ids_are_unique() {
        // テスト項目: 生成した接続 ID が重複しない
        // given (前提条件):

        // when (操作):
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();

        // then (期待する結果):
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_room_id_rejects_empty() {
        // テスト項目: 空のルーム ID は EmptyRoomId エラーになる
        // given (前提条件):

        // when (操作):
        let result = RoomId::try_from("");

        // then (期待する結果):
        assert_eq!(result, Err(ValidationError::EmptyRoomId));
    }

    #[test]
    fn test_room_named_global_is_an_ordinary_room() {
        // テスト項目: "global" という名前のルームも通常のルームとして扱われる
        // given (前提条件):

        // when (操作):
        let room = RoomId::parse_optional("global");

        // then (期待する結果):
        assert_eq!(room.map(RoomId::into_string), Some("global".to_string()));
        assert_eq!(RoomId::parse_optional(""), None);
    }
}
