//! Infrastructure layer: registry storage, transports, collaborator
//! implementations and wire DTOs.

pub mod dto;
pub mod message_pusher;
pub mod registry;
pub mod repository;
