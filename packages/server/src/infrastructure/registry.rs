//! Connection Registry
//!
//! 生存中の全接続を接続 ID で管理する唯一の情報源です。
//!
//! ## 並行性
//!
//! - 内部の HashMap は単一の読み書きロックで保護
//! - 読み取り同士は並行に実行でき、書き込みは他の全操作と排他
//! - ロック保持中にネットワーク I/O は行わない（I/O はブロードキャストエンジンの責務）
//! - HashMap そのものは外部に公開しない

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::domain::{Connection, ConnectionId, RegistryError};

/// Thread-safe store of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. It becomes visible to broadcasts immediately.
    pub async fn add(&self, connection: Arc<Connection>) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(connection.id()) {
            return Err(RegistryError::DuplicateConnection(
                connection.id().as_str().to_string(),
            ));
        }
        tracing::debug!("Connection '{}' added to registry", connection.id());
        connections.insert(connection.id().clone(), connection);
        Ok(())
    }

    /// Deregister a connection. Not idempotent: a second call returns `NotFound`.
    pub async fn remove(&self, id: &ConnectionId) -> Result<Arc<Connection>, RegistryError> {
        let mut connections = self.connections.write().await;
        let removed = connections
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.as_str().to_string()))?;
        tracing::debug!("Connection '{}' removed from registry", id);
        Ok(removed)
    }

    pub async fn get(&self, id: &ConnectionId) -> Result<Arc<Connection>, RegistryError> {
        let connections = self.connections.read().await;
        connections
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.as_str().to_string()))
    }

    /// Snapshot of the whole registry. Later registry changes do not affect it.
    pub async fn list_all(&self) -> HashMap<ConnectionId, Arc<Connection>> {
        self.connections.read().await.clone()
    }

    /// Active connections, in unspecified order.
    pub async fn list_active(&self) -> Vec<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|connection| connection.is_active())
            .cloned()
            .collect()
    }

    /// Number of registered connections, active or not.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Empty the registry (full-service reset only).
    pub async fn clear(&self) {
        let mut connections = self.connections.write().await;
        tracing::info!("Clearing {} connection(s) from registry", connections.len());
        connections.clear();
    }
}
