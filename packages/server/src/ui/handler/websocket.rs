//! WebSocket connection handlers.
//!
//! 1 接続につき 2 つのタスクが動きます。
//!
//! - 受信ループ（`read_loop`）: フレームを受信して `ConnectionSession` に渡す
//! - 死活監視タスク（`keepalive_loop`）: 一定間隔で Ping を送信する
//!
//! 受信の期限は相手からフレーム（Pong を含む）を受信したときだけ延長されます。
//! Ping に応答しない相手は期限切れで切断され、
//! 期限切れ・受信エラー・相手からの Close のいずれかで `ConnectionSession::close` に進みます。

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitStream, StreamExt};
use serde::Deserialize;
use tokio::{sync::Notify, task::JoinHandle, time::Instant};

use crate::{
    domain::{Connection, ConnectionId, RoomId},
    infrastructure::message_pusher::WebSocketSink,
    ui::state::AppState,
    usecase::{ConnectionSession, SessionError},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// 表示名（省略可）
    pub username: Option<String>,
    /// 最初に入室するルーム（省略可）
    #[serde(rename = "roomId")]
    pub room_id: Option<String>,
}

pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!("WebSocket upgrade rejected: {}", rejection);
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let room = match query.room_id.filter(|raw| !raw.is_empty()) {
        None => None,
        Some(raw) => match RoomId::new(raw) {
            Ok(room) => Some(room),
            Err(e) => {
                tracing::warn!("Invalid roomId: {}", e);
                return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        },
    };

    // 満室なら upgrade 前に 503 を返す。定員の確定は open() で行う
    if let Some(room) = &room {
        match state.lifecycle.admit(room, None).await {
            Ok(()) => {}
            Err(e @ SessionError::RoomFull { .. }) => {
                tracing::warn!("Rejecting connection: {}", e);
                return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
            }
            Err(e) => {
                tracing::error!("Room admission failed: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    let settings = state.settings;
    ws.max_message_size(settings.max_frame_bytes)
        .max_frame_size(settings.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, query.username, room))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    display_name: Option<String>,
    room: Option<RoomId>,
) {
    let settings = state.settings;
    let (sender, mut receiver) = socket.split();

    let connection = Arc::new(
        Connection::new(ConnectionId::generate(), Box::new(WebSocketSink::new(sender)))
            .with_display_name(display_name)
            .with_room(room)
            .with_write_timeout(settings.write_timeout),
    );
    let mut session = state.lifecycle.session(connection.clone());

    if let Err(e) = session.open().await {
        tracing::warn!("Failed to open connection '{}': {}", connection.id(), e);
        session.close().await;
        return;
    }

    let ping_failed = Arc::new(Notify::new());
    let keepalive_task =
        keepalive_loop(connection.clone(), settings.ping_interval, ping_failed.clone());

    read_loop(&mut session, &mut receiver, settings.read_timeout, &ping_failed).await;

    keepalive_task.abort();
    session.close().await;
}

/// Sends a ping every `interval`. The peer's pong refreshes the read deadline
/// in `read_loop`; a peer that never answers runs into that deadline.
///
/// A failed ping deactivates the connection and wakes the read loop through
/// `ping_failed`.
fn keepalive_loop(
    connection: Arc<Connection>,
    interval: Duration,
    ping_failed: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 最初の tick は即座に完了する
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = connection.ping().await {
                tracing::warn!("Ping to '{}' failed: {}", connection.id(), e);
                connection.deactivate();
                ping_failed.notify_one();
                break;
            }
        }
    })
}

async fn read_loop(
    session: &mut ConnectionSession,
    receiver: &mut SplitStream<WebSocket>,
    read_timeout: Duration,
    ping_failed: &Notify,
) {
    let connection = session.connection().clone();
    let mut deadline = Instant::now() + read_timeout;

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::warn!("Read from '{}' failed: {}", connection.id(), e);
                        break;
                    }
                    None => break,
                };

                connection.touch();
                deadline = Instant::now() + read_timeout;

                match message {
                    Message::Text(text) => {
                        tracing::debug!("Received from '{}': {}", connection.id(), text.as_str());
                        session.handle_text(text.as_str()).await;
                    }
                    Message::Close(_) => {
                        tracing::info!("Connection '{}' sent close", connection.id());
                        break;
                    }
                    Message::Binary(_) => {
                        tracing::debug!("Ignoring binary frame from '{}'", connection.id());
                    }
                    // Ping への Pong は axum が返す
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!("Read deadline exceeded for '{}'", connection.id());
                break;
            }
            // 送信した Ping では期限を延長しない
            _ = ping_failed.notified() => {}
        }

        if !connection.is_active() {
            tracing::info!("Connection '{}' was deactivated", connection.id());
            break;
        }
    }
}
