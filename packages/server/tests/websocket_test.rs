//! Integration tests: the real axum server on an ephemeral port, driven by
//! WebSocket and HTTP clients.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use hiroba_server::{
    domain::{RoomId, RoomInfo},
    infrastructure::{
        dto::http::{MemberDto, RoomSummaryDto},
        registry::ConnectionRegistry,
        repository::{InMemoryMessageStore, InMemoryRoomDirectory},
    },
    ui::{ConnectionSettings, Server},
    usecase::{BroadcastConfig, BroadcastEngine, ConnectionLifecycle},
};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a client waits for a frame that should arrive.
const RECV_TIMEOUT: Duration = Duration::from_secs(3);
/// How long a client waits to prove that nothing arrives.
const SILENCE: Duration = Duration::from_millis(200);

/// Helper struct to manage an in-process server
struct TestServer {
    addr: SocketAddr,
    engine: Arc<BroadcastEngine>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    async fn start(rooms: Vec<RoomInfo>) -> Self {
        let settings = ConnectionSettings {
            ping_interval: Duration::from_millis(200),
            read_timeout: Duration::from_secs(5),
            ..ConnectionSettings::default()
        };
        Self::start_with_settings(rooms, settings).await
    }

    async fn start_with_settings(rooms: Vec<RoomInfo>, settings: ConnectionSettings) -> Self {
        let engine = Arc::new(BroadcastEngine::new(
            Arc::new(ConnectionRegistry::new()),
            BroadcastConfig::default(),
        ));
        let lifecycle = ConnectionLifecycle::new(
            engine.clone(),
            Arc::new(InMemoryRoomDirectory::with_rooms(rooms)),
            Arc::new(InMemoryMessageStore::new()),
        );
        let server = Server::new(lifecycle, settings);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        TestServer {
            addr,
            engine,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    fn ws_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("ws://{}/ws", self.addr)
        } else {
            format!("ws://{}/ws?{}", self.addr, query)
        }
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connect(&self, query: &str) -> Client {
        let (client, _response) = connect_async(self.ws_url(query)).await.unwrap();
        client
    }

    /// Wait until the registry holds exactly `expected` connections.
    async fn wait_for_count(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        while self.engine.registry().count().await != expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "registry never reached {} connection(s)",
                expected
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(RECV_TIMEOUT, handle).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn room_info(id: &str, max_users: usize) -> RoomInfo {
    RoomInfo {
        id: RoomId::try_from(id).unwrap(),
        name: format!("Room {}", id),
        description: String::new(),
        max_users,
    }
}

/// Next text frame, skipping control frames.
async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = frame {
            return text.as_str().to_string();
        }
    }
}

async fn next_json(client: &mut Client) -> serde_json::Value {
    serde_json::from_str(&next_text(client).await).unwrap()
}

/// Assert that no text frame arrives within `SILENCE`.
async fn assert_silent(client: &mut Client) {
    let deadline = tokio::time::Instant::now() + SILENCE;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text.as_str()),
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("unexpected stream state: {:?}", other),
        }
    }
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn test_health_check() {
    // テスト項目: ヘルスチェックが 200 と {"status":"ok"} を返す
    // given (前提条件):
    let server = TestServer::start(vec![]).await;

    // when (操作):
    let response = reqwest::get(server.http_url("/api/health")).await.unwrap();

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    server.stop().await;
}

#[tokio::test]
async fn test_room_broadcast_reaches_room_members_only() {
    // テスト項目: ルーム内のチャットは同じルームのメンバーにだけ届き、
    //             ルームにいない接続のチャットは全員に届く
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice&roomId=lobby").await;
    assert_eq!(next_json(&mut alice).await["content"], "alice joined the room");
    let mut bob = server.connect("username=bob&roomId=lobby").await;
    assert_eq!(next_json(&mut alice).await["content"], "bob joined the room");
    assert_eq!(next_json(&mut bob).await["content"], "bob joined the room");
    let mut carol = server.connect("username=carol").await;
    server.wait_for_count(3).await;

    // when (操作):
    send_text(&mut alice, "hello lobby").await;

    // then (期待する結果):
    assert_eq!(next_text(&mut alice).await, "hello lobby");
    assert_eq!(next_text(&mut bob).await, "hello lobby");
    assert_silent(&mut carol).await;

    // when (操作):
    send_text(&mut carol, "hello everyone").await;

    // then (期待する結果):
    assert_eq!(next_text(&mut alice).await, "hello everyone");
    assert_eq!(next_text(&mut bob).await, "hello everyone");
    assert_eq!(next_text(&mut carol).await, "hello everyone");
    server.stop().await;
}

#[tokio::test]
async fn test_join_and_leave_room() {
    // テスト項目: join_room / leave_room で入退室し、ルームの履歴にシステムメッセージが残る
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice").await;
    server.wait_for_count(1).await;

    // when (操作):
    send_text(&mut alice, r#"{"type":"join_room","target":"games"}"#).await;
    let joined = next_json(&mut alice).await;
    send_text(&mut alice, r#"{"type":"leave_room"}"#).await;
    let left = next_json(&mut alice).await;

    // then (期待する結果):
    assert_eq!(joined["type"], "system");
    assert_eq!(joined["target"], "games");
    assert_eq!(joined["content"], "alice joined the room");
    assert_eq!(left["content"], "alice left the room");

    let history: Vec<serde_json::Value> =
        reqwest::get(server.http_url("/api/rooms/games/history"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    let contents: Vec<&str> = history
        .iter()
        .map(|entry| entry["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["alice joined the room", "alice left the room"]);

    let members: Vec<MemberDto> = reqwest::get(server.http_url("/api/rooms/games/members"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(members.is_empty());
    server.stop().await;
}

#[tokio::test]
async fn test_private_message() {
    // テスト項目: プライベートメッセージは宛先の接続にだけ、送信者付きで届く
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice").await;
    let mut bob = server.connect("username=bob").await;
    server.wait_for_count(2).await;

    let connections: Vec<MemberDto> = reqwest::get(server.http_url("/debug/connections"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let bob_id = connections
        .iter()
        .find(|member| member.display_name.as_deref() == Some("bob"))
        .map(|member| member.connection_id.clone())
        .unwrap();

    // when (操作):
    let frame = serde_json::json!({"type": "private", "target": bob_id, "content": "psst"});
    send_text(&mut alice, &frame.to_string()).await;

    // then (期待する結果):
    let received = next_json(&mut bob).await;
    assert_eq!(received["type"], "private");
    assert_eq!(received["content"], "psst");
    assert_eq!(received["sender"], "alice");
    assert!(received["time"].is_i64());
    assert_silent(&mut alice).await;
    server.stop().await;
}

#[tokio::test]
async fn test_private_message_to_unknown_target_returns_error_frame() {
    // テスト項目: 存在しない宛先へのプライベートメッセージは送信者にエラーフレームが返る
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice").await;
    server.wait_for_count(1).await;

    // when (操作):
    send_text(
        &mut alice,
        r#"{"type":"private","target":"nobody","content":"psst"}"#,
    )
    .await;

    // then (期待する結果):
    let frame = next_json(&mut alice).await;
    assert_eq!(frame["type"], "error");
    server.stop().await;
}

#[tokio::test]
async fn test_full_room_rejects_upgrade() {
    // テスト項目: 定員に達したルームへの接続はアップグレード前に 503 で拒否される
    // given (前提条件):
    let server = TestServer::start(vec![room_info("tiny", 1)]).await;
    let mut alice = server.connect("username=alice&roomId=tiny").await;
    next_text(&mut alice).await;

    // when (操作):
    let result = connect_async(server.ws_url("username=bob&roomId=tiny")).await;

    // then (期待する結果):
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected HTTP 503, got {:?}", other.map(|(_, r)| r.status())),
    }
    assert_eq!(server.engine.registry().count().await, 1);
    server.stop().await;
}

#[tokio::test]
async fn test_blank_room_id_is_rejected() {
    // テスト項目: 空白だけの roomId での接続は 400 で拒否される
    // given (前提条件):
    let server = TestServer::start(vec![]).await;

    // when (操作):
    let result = connect_async(server.ws_url("roomId=%20%20")).await;

    // then (期待する結果):
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 400),
        other => panic!("expected HTTP 400, got {:?}", other.map(|(_, r)| r.status())),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_plain_http_request_to_ws_is_rejected() {
    // テスト項目: WebSocket のアップグレードヘッダーがないリクエストはクライアントエラーになる
    // given (前提条件):
    let server = TestServer::start(vec![]).await;

    // when (操作):
    let response = reqwest::get(server.ws_url("").replace("ws://", "http://"))
        .await
        .unwrap();

    // then (期待する結果):
    assert!(response.status().is_client_error());
    assert_eq!(server.engine.registry().count().await, 0);
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_announces_leave_and_unregisters() {
    // テスト項目: 切断すると残りのメンバーに退出通知が届き、レジストリから削除される
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice&roomId=lobby").await;
    next_text(&mut alice).await;
    let mut bob = server.connect("username=bob&roomId=lobby").await;
    next_text(&mut alice).await;
    next_text(&mut bob).await;

    // when (操作):
    alice.close(None).await.unwrap();

    // then (期待する結果):
    let frame = next_json(&mut bob).await;
    assert_eq!(frame["type"], "system");
    assert_eq!(frame["content"], "alice left the room");
    server.wait_for_count(1).await;
    server.stop().await;
}

#[tokio::test]
async fn test_room_listing_endpoints() {
    // テスト項目: ルーム一覧・詳細・永続化メッセージのエンドポイントがアクティブな接続と履歴を反映する
    // given (前提条件):
    let server = TestServer::start(vec![room_info("lobby", 10), room_info("quiet", 10)]).await;
    let mut alice = server.connect("username=alice&roomId=lobby").await;
    next_text(&mut alice).await;
    send_text(&mut alice, "first").await;
    next_text(&mut alice).await;

    // when (操作):
    let rooms: Vec<RoomSummaryDto> = reqwest::get(server.http_url("/api/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let detail: serde_json::Value = reqwest::get(server.http_url("/api/rooms/lobby"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages: Vec<serde_json::Value> =
        reqwest::get(server.http_url("/api/rooms/lobby/messages?limit=1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    let missing = reqwest::get(server.http_url("/api/rooms/nowhere"))
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(rooms.len(), 2);
    let lobby = rooms.iter().find(|room| room.id == "lobby").unwrap();
    assert_eq!(lobby.active_users, 1);
    assert_eq!(lobby.max_users, 10);
    let quiet = rooms.iter().find(|room| room.id == "quiet").unwrap();
    assert_eq!(quiet.active_users, 0);

    assert_eq!(detail["name"], "Room lobby");
    assert_eq!(detail["active_users"], 1);
    assert_eq!(detail["recent_messages"].as_array().unwrap().len(), 2);

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "first");
    assert_eq!(messages[0]["user_id"], "alice");

    assert_eq!(missing.status(), 404);
    server.stop().await;
}

#[tokio::test]
async fn test_global_history_endpoint() {
    // テスト項目: ルームにいない接続のメッセージはグローバルの履歴に記録される
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice").await;
    server.wait_for_count(1).await;

    // when (操作):
    send_text(&mut alice, "hi there").await;
    next_text(&mut alice).await;
    let history: Vec<serde_json::Value> = reqwest::get(server.http_url("/api/history"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["content"], "hi there");
    assert_eq!(history[0]["sender"], "alice");
    assert!(history[0].get("room").is_none());
    server.stop().await;
}

/// Short deadlines so that a peer that never answers pings is dropped quickly.
fn short_deadline_settings() -> ConnectionSettings {
    ConnectionSettings {
        ping_interval: Duration::from_millis(150),
        read_timeout: Duration::from_millis(600),
        ..ConnectionSettings::default()
    }
}

#[tokio::test]
async fn test_pong_keeps_idle_connection_open() {
    // テスト項目: 何も送信しない接続も、Ping に Pong を返していれば受信期限を過ぎても維持される
    // given (前提条件):
    let server = TestServer::start_with_settings(vec![], short_deadline_settings()).await;
    let mut alice = server.connect("username=alice").await;
    server.wait_for_count(1).await;

    // when (操作):
    // 受信期限 (600ms) の 2 倍以上ストリームを読み続ける。受信した Ping には tungstenite が Pong を返す
    let idle = tokio::time::timeout(Duration::from_millis(1500), async {
        loop {
            match alice.next().await {
                Some(Ok(Message::Ping(_))) => continue,
                other => return other,
            }
        }
    })
    .await;

    // then (期待する結果):
    assert!(idle.is_err(), "connection should stay idle, got {:?}", idle);
    assert_eq!(server.engine.registry().count().await, 1);
    let connections: Vec<MemberDto> = reqwest::get(server.http_url("/debug/connections"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(connections[0].active);
    server.stop().await;
}

#[tokio::test]
async fn test_silent_peer_is_dropped_after_read_deadline() {
    // テスト項目: ストリームを読まず Pong を返さない接続は、Ping を送り続けても受信期限で切断される
    // given (前提条件):
    let server = TestServer::start_with_settings(vec![], short_deadline_settings()).await;
    let alice = server.connect("username=alice").await;
    server.wait_for_count(1).await;

    // when (操作):
    // alice は何も読まない（Pong も返らない）
    let started = tokio::time::Instant::now();
    server.wait_for_count(0).await;

    // then (期待する結果):
    assert!(started.elapsed() >= Duration::from_millis(300));
    drop(alice);
    server.stop().await;
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    // テスト項目: 最大サイズ (4096 bytes) を超えるフレームを送ると接続が切断され、登録が解除される
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let mut alice = server.connect("username=alice").await;
    let mut bob = server.connect("username=bob").await;
    server.wait_for_count(2).await;

    // when (操作):
    let oversized = "x".repeat(5000);
    let _ = alice.send(Message::Text(oversized.as_str().into())).await;

    // then (期待する結果):
    server.wait_for_count(1).await;
    let members: Vec<MemberDto> = reqwest::get(server.http_url("/debug/connections"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].display_name.as_deref(), Some("bob"));
    assert_silent(&mut bob).await;
    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_clears_registry() {
    // テスト項目: サーバーを停止するとレジストリが空になる
    // given (前提条件):
    let server = TestServer::start(vec![]).await;
    let alice = server.connect("username=alice").await;
    server.wait_for_count(1).await;
    let engine = server.engine.clone();

    // when (操作):
    drop(alice);
    server.stop().await;

    // then (期待する結果):
    assert_eq!(engine.registry().count().await, 0);
}
