//! UseCase: 接続ライフサイクル
//!
//! ## 状態遷移
//!
//! ```text
//! Connecting ──open()──▶ Open ──close()──▶ Closing ──▶ Closed
//!                         │ ▲
//!            join_room    │ │ leave_room
//!                         ▼ │
//!                   (InRoom ⇄ NotInRoom)
//! ```
//!
//! - InRoom / NotInRoom は状態ではなく `Connection::room()` で表現します
//! - `close()` のクリーンアップ（退出通知・登録解除・トランスポートのクローズ）は
//!   途中で失敗しても全て実行されます
//! - 定員の確認とルームへの所属の変更（登録・入室）は入室ロックの中で行うため、
//!   同時に入室しても `max_users` を超えません

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    domain::{
        ClientCommand, Connection, ConnectionId, MessageStore, RepositoryError, RoomDirectory,
        RoomId, ValidationError,
    },
    infrastructure::dto::websocket::WireEnvelope,
};

use super::{
    broadcast::{BroadcastEngine, joined_notice, left_notice},
    error::SessionError,
};

/// Shared collaborators of every connection session.
#[derive(Clone)]
pub struct ConnectionLifecycle {
    engine: Arc<BroadcastEngine>,
    rooms: Arc<dyn RoomDirectory>,
    store: Arc<dyn MessageStore>,
    /// 定員の確認からルームへの所属までを直列化する
    admission: Arc<Mutex<()>>,
}

impl ConnectionLifecycle {
    pub fn new(
        engine: Arc<BroadcastEngine>,
        rooms: Arc<dyn RoomDirectory>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            engine,
            rooms,
            store,
            admission: Arc::new(Mutex::new(())),
        }
    }

    pub fn engine(&self) -> &Arc<BroadcastEngine> {
        &self.engine
    }

    pub fn rooms(&self) -> &Arc<dyn RoomDirectory> {
        &self.rooms
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// ルームへの入室可否を判定
    ///
    /// ディレクトリに登録されたルームは `max_users` を上限とします。
    /// 登録されていないルームは上限なしのアドホックなルームとして扱います。
    /// `exclude` に指定した接続はメンバー数に含めません。
    ///
    /// 判定だけを行うため、結果はすぐに古くなり得ます。
    /// セッションは入室ロックを取った上でこれを呼びます。
    pub async fn admit(
        &self,
        room: &RoomId,
        exclude: Option<&ConnectionId>,
    ) -> Result<(), SessionError> {
        let info = match self.rooms.get_room(room).await {
            Ok(info) => info,
            Err(RepositoryError::RoomNotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let members = self
            .engine
            .members_of(room.as_str())
            .await
            .iter()
            .filter(|connection| Some(connection.id()) != exclude)
            .count();
        if members >= info.max_users {
            return Err(SessionError::RoomFull {
                room: room.as_str().to_string(),
                max_users: info.max_users,
            });
        }
        Ok(())
    }

    /// 接続を管理するセッションを作成（まだ登録はされない）
    pub fn session(&self, connection: Arc<Connection>) -> ConnectionSession {
        ConnectionSession {
            lifecycle: self.clone(),
            connection,
            state: SessionState::Connecting,
        }
    }
}

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Drives one connection from registration to cleanup.
pub struct ConnectionSession {
    lifecycle: ConnectionLifecycle,
    connection: Arc<Connection>,
    state: SessionState,
}

impl ConnectionSession {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connecting → Open
    ///
    /// 接続を登録し、初期ルームがあれば入室通知を送信します。
    /// 初期ルームが定員に達していれば `RoomFull` で失敗し、Connecting のままです。
    pub async fn open(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::NotOpen);
        }

        {
            let _admission = self.lifecycle.admission.lock().await;
            if let Some(room) = self.connection.room() {
                self.lifecycle
                    .admit(&room, Some(self.connection.id()))
                    .await?;
            }
            self.engine().register(self.connection.clone()).await?;
        }
        if let Some(room) = self.connection.room() {
            let notice = joined_notice(&self.connection.label());
            self.persist(&room, &notice, true).await;
        }

        self.state = SessionState::Open;
        tracing::info!(
            "Connection '{}' opened (room: {:?})",
            self.connection.id(),
            self.connection.room().map(RoomId::into_string)
        );
        Ok(())
    }

    /// 受信したテキストフレームを処理
    ///
    /// 失敗した場合はエラーフレームを送信元の接続にだけ返します。
    pub async fn handle_text(&mut self, text: &str) {
        let command = ClientCommand::decode(text);
        if let Err(e) = self.dispatch(command).await {
            tracing::warn!(
                "Command from '{}' failed ({:?}): {}",
                self.connection.id(),
                e.kind(),
                e
            );
            self.report(&e).await;
        }
    }

    /// デコード済みのコマンドを実行
    pub async fn dispatch(&mut self, command: ClientCommand) -> Result<(), SessionError> {
        if self.state != SessionState::Open {
            return Err(SessionError::NotOpen);
        }

        match command {
            ClientCommand::JoinRoom { target } => self.join_room(target).await,
            ClientCommand::LeaveRoom => self.leave_room().await,
            ClientCommand::Private { target, content } => {
                self.send_private(&target, content).await
            }
            ClientCommand::Chat { raw } => self.send_chat(&raw).await,
        }
    }

    /// 別のルームにいる場合は先に退出してから `target` に入室
    pub async fn join_room(&mut self, target: RoomId) -> Result<(), SessionError> {
        if self.connection.is_in_room(&target) {
            return Ok(());
        }

        {
            let admission = self.lifecycle.admission.clone();
            let _admission = admission.lock().await;
            self.lifecycle
                .admit(&target, Some(self.connection.id()))
                .await?;

            self.leave_room().await?;
            self.connection.set_room(Some(target.clone()));
        }

        let notice = joined_notice(&self.connection.label());
        if let Err(e) = self.engine().announce_to_room(&target, &notice).await {
            tracing::debug!("Join notice for room '{}' not delivered: {}", target, e);
        }
        self.persist(&target, &notice, true).await;
        tracing::info!("Connection '{}' joined room '{}'", self.connection.id(), target);
        Ok(())
    }

    /// 現在のルームから退出（ルームにいなければ何もしない）
    pub async fn leave_room(&mut self) -> Result<(), SessionError> {
        let Some(room) = self.connection.room() else {
            return Ok(());
        };

        // 退出者自身も通知を受け取れるよう、ルームを外す前に送信する
        let notice = left_notice(&self.connection.label());
        if let Err(e) = self.engine().announce_to_room(&room, &notice).await {
            tracing::debug!("Leave notice for room '{}' not delivered: {}", room, e);
        }
        self.connection.set_room(None);
        self.persist(&room, &notice, true).await;
        tracing::info!("Connection '{}' left room '{}'", self.connection.id(), room);
        Ok(())
    }

    /// 送信者と時刻を付けて 1 つの接続に送信。ルームの状態は変わらない
    pub async fn send_private(&mut self, target: &str, content: String) -> Result<(), SessionError> {
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let frame =
            WireEnvelope::private(content, self.connection.label(), self.engine().now())
                .to_frame()?;
        self.engine().send_direct(target, &frame).await?;
        Ok(())
    }

    /// ルームにいればルーム内へ、いなければ全体へ転送
    pub async fn send_chat(&mut self, raw: &str) -> Result<(), SessionError> {
        let sender = self.connection.display_name();
        match self.connection.room() {
            Some(room) => {
                self.engine()
                    .broadcast_to_room_from(room.as_str(), sender, raw)
                    .await?;
                self.persist(&room, raw, false).await;
            }
            None => {
                self.engine().broadcast_all_from(sender, raw).await?;
            }
        }
        Ok(())
    }

    /// Open → Closing → Closed
    ///
    /// 登録済みであれば自身を無効化し、ルームにいれば退出通知を送り、登録を解除します。
    /// 退出通知は残りのメンバーがいなくても履歴に記録されます。
    /// トランスポートのクローズは状態に関係なく必ず行います。
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let registered = self.state == SessionState::Open;
        self.state = SessionState::Closing;

        if registered {
            self.connection.deactivate();

            if let Some(room) = self.connection.room() {
                let notice = left_notice(&self.connection.label());
                if let Err(e) = self
                    .engine()
                    .announce_departure(&room, &notice, self.connection.id())
                    .await
                {
                    tracing::debug!("Leave notice for room '{}' not delivered: {}", room, e);
                }
                self.persist(&room, &notice, true).await;
            }

            if let Err(e) = self.engine().unregister(self.connection.id()).await {
                tracing::warn!("Failed to unregister '{}': {}", self.connection.id(), e);
            }
        }

        if let Err(e) = self.connection.close().await {
            tracing::debug!("Closing '{}' failed: {}", self.connection.id(), e);
        }

        self.state = SessionState::Closed;
        tracing::info!("Connection '{}' closed", self.connection.id());
    }

    fn engine(&self) -> &Arc<BroadcastEngine> {
        &self.lifecycle.engine
    }

    async fn persist(&self, room: &RoomId, content: &str, is_system: bool) {
        if let Err(e) = self
            .lifecycle
            .store
            .save_message(room, &self.connection.label(), content, is_system)
            .await
        {
            tracing::warn!("Failed to persist message for room '{}': {}", room, e);
        }
    }

    async fn report(&self, error: &SessionError) {
        let frame = match WireEnvelope::error(error.to_string(), self.engine().now()).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to encode error frame: {}", e);
                return;
            }
        };
        if let Err(e) = self.connection.send_text(frame).await {
            tracing::debug!(
                "Error frame for '{}' not delivered: {}",
                self.connection.id(),
                e
            );
        }
    }
}
