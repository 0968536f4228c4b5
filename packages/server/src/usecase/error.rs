//! UseCase error types.

use thiserror::Error;

use crate::domain::{ErrorKind, RegistryError, RepositoryError, SinkError, ValidationError};

/// Broadcast engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no active connections")]
    NoActiveConnections,

    #[error("no active connections in room '{0}'")]
    NoActiveConnectionsInRoom(String),

    #[error("connection '{0}' is inactive")]
    InactiveConnection(String),

    /// A write to one connection failed. This is the error handed to the
    /// failure callback.
    #[error("connection '{connection_id}' write failed: {source}")]
    Transport {
        connection_id: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl BroadcastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BroadcastError::Validation(_) => ErrorKind::Validation,
            BroadcastError::Registry(e) => e.kind(),
            BroadcastError::NoActiveConnections
            | BroadcastError::NoActiveConnectionsInRoom(_)
            | BroadcastError::InactiveConnection(_) => ErrorKind::Capacity,
            BroadcastError::Transport { .. } | BroadcastError::Encode(_) => ErrorKind::Transport,
        }
    }
}

impl From<serde_json::Error> for BroadcastError {
    fn from(e: serde_json::Error) -> Self {
        BroadcastError::Encode(e.to_string())
    }
}

/// Connection lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is not open")]
    NotOpen,

    #[error("room '{room}' is full ({max_users} users)")]
    RoomFull { room: String, max_users: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotOpen | SessionError::Validation(_) => ErrorKind::Validation,
            SessionError::RoomFull { .. } => ErrorKind::Capacity,
            SessionError::Registry(e) => e.kind(),
            SessionError::Broadcast(e) => e.kind(),
            SessionError::Repository(e) => e.kind(),
            SessionError::Encode(_) => ErrorKind::Transport,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Encode(e.to_string())
    }
}
