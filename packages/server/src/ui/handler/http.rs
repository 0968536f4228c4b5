//! HTTP API endpoint handlers.
//!
//! ルーム一覧系のエンドポイントは Broadcast Engine の `history_for` / `members_of` を
//! 参照して、最近のメッセージとアクティブな接続数を返します。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    domain::{ErrorKind, LogEntry, RepositoryError, RoomId, StoredMessage, ValidationError},
    infrastructure::dto::http::{MemberDto, MessagesQuery, RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
};

/// `GET /api/rooms/{room_id}/messages` の既定の件数
const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Error response of the HTTP API
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn from_kind(kind: ErrorKind, message: String) -> Self {
        let status = match kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Capacity => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Transport => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::from_kind(ErrorKind::Validation, e.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("HTTP API error: {}", self.message);
        }
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn parse_room_id(room_id: String) -> Result<RoomId, ApiError> {
    Ok(RoomId::new(room_id)?)
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomSummaryDto>>, ApiError> {
    let rooms = state.rooms().list_rooms().await?;

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        let active_users = state.engine().members_of(room.id.as_str()).await.len();
        summaries.push(RoomSummaryDto {
            id: room.id.into_string(),
            name: room.name,
            description: room.description,
            max_users: room.max_users,
            active_users,
        });
    }

    Ok(Json(summaries))
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, ApiError> {
    let room_id = parse_room_id(room_id)?;
    let room = state.rooms().get_room(&room_id).await?;

    let active_users = state.engine().members_of(room_id.as_str()).await.len();
    let recent_messages = state.engine().history_for(room_id.as_str()).await;

    Ok(Json(RoomDetailDto {
        id: room.id.into_string(),
        name: room.name,
        description: room.description,
        max_users: room.max_users,
        active_users,
        recent_messages,
    }))
}

/// Active members of a room (ad-hoc rooms included)
pub async fn get_room_members(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MemberDto>>, ApiError> {
    let room_id = parse_room_id(room_id)?;
    let mut members: Vec<MemberDto> = state
        .engine()
        .members_of(room_id.as_str())
        .await
        .iter()
        .map(|connection| MemberDto::from(connection.as_ref()))
        .collect();
    members.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));

    Ok(Json(members))
}

/// Bounded log of a room
pub async fn get_room_history(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let room_id = parse_room_id(room_id)?;
    Ok(Json(state.engine().history_for(room_id.as_str()).await))
}

/// Persisted messages of a room, oldest first
pub async fn get_room_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    let room_id = parse_room_id(room_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    let messages = state.store().list_messages(&room_id, limit).await?;
    Ok(Json(messages))
}

/// Bounded log of the global scope (connections without a room)
pub async fn get_global_history(State(state): State<Arc<AppState>>) -> Json<Vec<LogEntry>> {
    Json(state.engine().history_for("").await)
}

/// Debug endpoint: every registered connection, active or not
pub async fn debug_connections(State(state): State<Arc<AppState>>) -> Json<Vec<MemberDto>> {
    let mut connections: Vec<MemberDto> = state
        .engine()
        .registry()
        .list_all()
        .await
        .values()
        .map(|connection| MemberDto::from(connection.as_ref()))
        .collect();
    connections.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));

    Json(connections)
}
