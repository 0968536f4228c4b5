//! Hiroba: real-time message fan-out over WebSocket.
//!
//! - `domain`: connections, rooms, log entries and collaborator interfaces
//! - `infrastructure`: connection registry, WebSocket transport, in-memory collaborators, wire DTOs
//! - `usecase`: broadcast engine and connection lifecycle
//! - `ui`: axum router and handlers

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

#[cfg(test)]
mod test_support;
