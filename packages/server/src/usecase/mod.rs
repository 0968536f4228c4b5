//! UseCase layer: the broadcast engine and the per-connection lifecycle.

pub mod broadcast;
pub mod error;
pub mod history;
pub mod lifecycle;

pub use broadcast::{BroadcastConfig, BroadcastEngine, FailureHandler};
pub use error::{BroadcastError, SessionError};
pub use history::MessageHistory;
pub use lifecycle::{ConnectionLifecycle, ConnectionSession, SessionState};
