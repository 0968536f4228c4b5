//! Domain layer: connections, rooms, log entries and the collaborator
//! interfaces the engine consumes.

pub mod connection;
pub mod error;
pub mod message;
pub mod repository;
pub mod value_object;

pub use connection::{Connection, ConnectionSink, SinkError};
pub use error::{ErrorKind, RegistryError, RepositoryError, ValidationError};
pub use message::{ClientCommand, LogEntry, MessageKind};
pub use repository::{MessageStore, RoomDirectory, RoomInfo, StoredMessage};
pub use value_object::{ConnectionId, RoomId};
