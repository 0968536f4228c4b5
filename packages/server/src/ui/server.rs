//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::usecase::ConnectionLifecycle;

use super::{
    handler::{
        debug_connections, get_global_history, get_room_detail, get_room_history,
        get_room_members, get_room_messages, get_rooms, health_check, websocket_handler,
    },
    signal::shutdown_signal,
    state::{AppState, ConnectionSettings},
};

/// WebSocket fan-out server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(lifecycle, ConnectionSettings::default());
/// server.run("127.0.0.1", 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(lifecycle: ConnectionLifecycle, settings: ConnectionSettings) -> Self {
        Self {
            state: Arc::new(AppState::new(lifecycle, settings)),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Router with every endpoint of the server.
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .route("/api/rooms/{room_id}/members", get(get_room_members))
            .route("/api/rooms/{room_id}/history", get(get_room_history))
            .route("/api/rooms/{room_id}/messages", get(get_room_messages))
            .route("/api/history", get(get_global_history))
            .route("/debug/connections", get(debug_connections))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind `host:port` and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Fan-out server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves, then
    /// drop every registered connection.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.state.engine().reset().await;
        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
