//! Data Transfer Objects (DTO)
//!
//! WebSocket のワイヤーフォーマットと HTTP API のレスポンス形式を定義します。

pub mod conversion;
pub mod http;
pub mod websocket;
