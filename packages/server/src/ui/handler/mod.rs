//! Request handlers.

mod http;
mod websocket;

pub use http::{
    debug_connections, get_global_history, get_room_detail, get_room_history, get_room_members,
    get_room_messages, get_rooms, health_check,
};
pub use websocket::websocket_handler;
