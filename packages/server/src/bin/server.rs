//! Real-time message fan-out server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 --room lobby --room games
//! ```

use std::sync::Arc;

use clap::Parser;
use hiroba_server::{
    config::ServerConfig,
    infrastructure::{
        registry::ConnectionRegistry,
        repository::{InMemoryMessageStore, InMemoryRoomDirectory},
    },
    ui::Server,
    usecase::{BroadcastConfig, BroadcastEngine, ConnectionLifecycle},
};
use hiroba_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ServerConfig::parse();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }
    let rooms = match config.room_infos() {
        Ok(rooms) => rooms,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize dependencies in order:
    // 1. Registry
    // 2. Broadcast Engine
    // 3. Collaborators (room directory, message store)
    // 4. Lifecycle
    // 5. Server

    let registry = Arc::new(ConnectionRegistry::new());
    let engine = Arc::new(BroadcastEngine::new(
        registry,
        BroadcastConfig::default().with_max_log_size(config.max_log_size),
    ));

    for room in &rooms {
        tracing::info!("Room '{}' registered (max {} users)", room.id, room.max_users);
    }
    let room_directory = Arc::new(InMemoryRoomDirectory::with_rooms(rooms));
    let message_store = Arc::new(InMemoryMessageStore::new());

    let lifecycle = ConnectionLifecycle::new(engine, room_directory, message_store);

    let server = Server::new(lifecycle, config.connection_settings());
    if let Err(e) = server.run(&config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
