//! Collaborator interfaces
//!
//! ブロードキャストエンジンの外側にある CRUD 的な関心事（ルームのメタデータ、
//! メッセージの永続化）へのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use serde::Serialize;

use super::{RepositoryError, RoomId};

/// Room metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub max_users: usize,
}

/// A persisted message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredMessage {
    pub room_id: RoomId,
    pub user_id: String,
    pub content: String,
    pub is_system: bool,
    /// Unix seconds
    pub created_at: i64,
}

/// ルームのメタデータ参照
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// ルームを取得（存在しなければ `RepositoryError::RoomNotFound`）
    async fn get_room(&self, id: &RoomId) -> Result<RoomInfo, RepositoryError>;

    /// 全てのルームを取得
    async fn list_rooms(&self) -> Result<Vec<RoomInfo>, RepositoryError>;
}

/// メッセージの永続化
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// メッセージを保存
    async fn save_message(
        &self,
        room_id: &RoomId,
        user_id: &str,
        content: &str,
        is_system: bool,
    ) -> Result<(), RepositoryError>;

    /// ルームの最新メッセージを古い順に最大 `limit` 件取得
    async fn list_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, RepositoryError>;
}
