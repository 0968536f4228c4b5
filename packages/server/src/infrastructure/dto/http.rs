//! HTTP API response DTOs

use serde::{Deserialize, Serialize};

use crate::domain::LogEntry;

/// `GET /api/rooms` の要素
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub max_users: usize,
    pub active_users: usize,
}

/// `GET /api/rooms/{room_id}`
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub max_users: usize,
    pub active_users: usize,
    pub recent_messages: Vec<LogEntry>,
}

/// 接続中のメンバー
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDto {
    pub connection_id: String,
    pub display_name: Option<String>,
    pub room: Option<String>,
    pub active: bool,
    pub joined_at: String,
    pub last_active: String,
}

/// `GET /api/rooms/{room_id}/messages` のクエリ
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}
