//! インメモリ実装

mod message;
mod room;

pub use message::InMemoryMessageStore;
pub use room::InMemoryRoomDirectory;
