//! Server configuration (command line flags and `HIROBA_*` environment variables).

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::{
    domain::{RoomId, RoomInfo},
    ui::ConnectionSettings,
    usecase::history::DEFAULT_MAX_LOG_SIZE,
};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max-log-size must be at least 1")]
    ZeroLogSize,

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("ping interval ({ping:?}) must be shorter than the read timeout ({read:?})")]
    PingNotShorterThanReadTimeout { ping: Duration, read: Duration },

    #[error("invalid room id '{0}'")]
    InvalidRoom(String),
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "hiroba-server")]
#[command(about = "Real-time message fan-out server over WebSocket", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIROBA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "HIROBA_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum number of log entries kept per room
    #[arg(long, env = "HIROBA_MAX_LOG_SIZE", default_value_t = DEFAULT_MAX_LOG_SIZE)]
    pub max_log_size: usize,

    /// Interval between keep-alive pings (seconds)
    #[arg(long, env = "HIROBA_PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Inbound read deadline (seconds)
    #[arg(long, env = "HIROBA_READ_TIMEOUT_SECS", default_value_t = 60)]
    pub read_timeout_secs: u64,

    /// Outbound write deadline (seconds)
    #[arg(long, env = "HIROBA_WRITE_TIMEOUT_SECS", default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// Maximum size of one inbound frame (bytes)
    #[arg(long, env = "HIROBA_MAX_FRAME_BYTES", default_value_t = 4096)]
    pub max_frame_bytes: usize,

    /// Room to register in the room directory (repeatable)
    #[arg(long = "room", env = "HIROBA_ROOMS", value_delimiter = ',')]
    pub rooms: Vec<String>,

    /// Maximum number of users of each registered room
    #[arg(long, env = "HIROBA_ROOM_CAPACITY", default_value_t = 100)]
    pub room_capacity: usize,
}

impl ServerConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_log_size == 0 {
            return Err(ConfigError::ZeroLogSize);
        }
        for (name, value) in [
            ("ping-interval-secs", self.ping_interval_secs),
            ("read-timeout-secs", self.read_timeout_secs),
            ("write-timeout-secs", self.write_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue(name));
            }
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroValue("max-frame-bytes"));
        }
        if self.room_capacity == 0 {
            return Err(ConfigError::ZeroValue("room-capacity"));
        }
        if self.ping_interval() >= self.read_timeout() {
            return Err(ConfigError::PingNotShorterThanReadTimeout {
                ping: self.ping_interval(),
                read: self.read_timeout(),
            });
        }
        self.room_infos().map(|_| ())
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            ping_interval: self.ping_interval(),
            read_timeout: self.read_timeout(),
            write_timeout: self.write_timeout(),
            max_frame_bytes: self.max_frame_bytes,
        }
    }

    /// Rooms to seed the room directory with.
    pub fn room_infos(&self) -> Result<Vec<RoomInfo>, ConfigError> {
        self.rooms
            .iter()
            .map(|raw| {
                let id = RoomId::new(raw.clone())
                    .map_err(|_| ConfigError::InvalidRoom(raw.clone()))?;
                Ok(RoomInfo {
                    name: id.as_str().to_string(),
                    id,
                    description: String::new(),
                    max_users: self.room_capacity,
                })
            })
            .collect()
    }
}
