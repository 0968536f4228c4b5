//! Test doubles for connections.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{
    Connection, ConnectionId, ConnectionSink, RoomId, SinkError, connection::MockConnectionSink,
};

/// Sink that forwards every text frame to a channel.
pub struct RecordingSink {
    frames: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl ConnectionSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError> {
        self.frames.send(text).map_err(|_| SinkError::Closed)
    }

    async fn send_ping(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Active connection whose deliveries can be observed on the returned receiver.
pub fn recording_connection(
    id: &str,
    room: Option<&str>,
) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = Connection::new(
        ConnectionId::try_from(id).unwrap(),
        Box::new(RecordingSink { frames: tx }),
    )
    .with_display_name(Some(id.to_string()))
    .with_room(room.and_then(RoomId::parse_optional));
    (Arc::new(connection), rx)
}

/// Active connection whose every write fails and which expects to be closed once.
pub fn failing_connection(id: &str, room: Option<&str>) -> Arc<Connection> {
    let mut sink = MockConnectionSink::new();
    sink.expect_send_text()
        .returning(|_| Err(SinkError::Transport("broken pipe".to_string())));
    sink.expect_close().times(1).returning(|| Ok(()));
    let connection = Connection::new(ConnectionId::try_from(id).unwrap(), Box::new(sink))
        .with_room(room.and_then(RoomId::parse_optional));
    Arc::new(connection)
}

/// Every frame delivered so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}
