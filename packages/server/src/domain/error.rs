//! Domain error types.

use thiserror::Error;

/// Error taxonomy shared by every layer.
///
/// Handlers use it to decide how a failure is surfaced: validation,
/// not-found and capacity failures go back to the caller of that single
/// action, transport failures only ever cost the affected connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Transport,
    Capacity,
}

/// Invalid input rejected before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("room id is empty")]
    EmptyRoomId,

    #[error("connection id is empty")]
    EmptyConnectionId,
}

/// Connection registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("connection '{0}' is already registered")]
    DuplicateConnection(String),

    #[error("connection '{0}' not found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::DuplicateConnection(_) => ErrorKind::Conflict,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::InvalidArgument(_) => ErrorKind::Validation,
        }
    }
}

/// Collaborator (room metadata / message persistence) errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::RoomNotFound(_) => ErrorKind::NotFound,
            RepositoryError::Storage(_) => ErrorKind::Transport,
        }
    }
}
