use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use game_types::{AuthUser, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live WebSocket connection. Identity is resolved at upgrade time
/// and immutable for the connection's lifetime; outbound messages go
/// through an unbounded channel drained by the socket writer task.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: AuthUser,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId, identity: AuthUser) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            identity,
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
        identity: AuthUser,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id, identity);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        connections.remove(&id);
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn identity(&self, id: ConnectionId) -> Option<AuthUser> {
        let connections = self.connections.read().await;
        connections.get(&id).map(|conn| conn.identity.clone())
    }

    /// Whether the connection's outbound channel has gone away. Missing
    /// connections count as closed.
    pub async fn is_closed(&self, id: ConnectionId) -> bool {
        let connections = self.connections.read().await;
        connections.get(&id).map(|c| c.is_closed()).unwrap_or(true)
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&id) {
            connection.send_message(message)
        } else {
            Err("Connection not found".to_string())
        }
    }

    /// Best-effort fan-out; closed receivers are skipped.
    pub async fn send_to_many(&self, ids: &[ConnectionId], message: &ServerMessage) {
        let connections = self.connections.read().await;
        for id in ids {
            if let Some(connection) = connections.get(id) {
                let _ = connection.send_message(message.clone());
            }
        }
    }

    pub async fn cleanup_inactive_connections(&self, timeout: Duration) {
        let inactive_connections: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout) || conn.is_closed())
                .map(|conn| conn.id)
                .collect()
        };

        for connection_id in inactive_connections {
            tracing::info!("Removing inactive connection: {}", connection_id);
            self.remove_connection(connection_id).await;
        }
    }

    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(name: &str) -> AuthUser {
        AuthUser::guest(name.to_string())
    }

    #[tokio::test]
    async fn test_connection_creation_and_removal() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let _receiver = manager.create_connection(conn_id, guest("a")).await;
        assert_eq!(manager.connection_count().await, 1);
        assert_eq!(manager.identity(conn_id).await.unwrap().username, "a");

        manager.remove_connection(conn_id).await;
        assert_eq!(manager.connection_count().await, 0);
        assert!(manager.identity(conn_id).await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_connection_delivers() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();
        let mut receiver = manager.create_connection(conn_id, guest("a")).await;

        manager
            .send_to_connection(conn_id, ServerMessage::Pong)
            .await
            .unwrap();

        assert!(matches!(receiver.try_recv(), Ok(ServerMessage::Pong)));
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_fails() {
        let manager = ConnectionManager::new();
        let result = manager
            .send_to_connection(ConnectionId::new(), ServerMessage::Pong)
            .await;
        assert_eq!(result.unwrap_err(), "Connection not found");
    }

    #[tokio::test]
    async fn test_dropped_receiver_counts_as_closed() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let receiver = manager.create_connection(conn_id, guest("a")).await;
        assert!(!manager.is_closed(conn_id).await);

        drop(receiver);
        assert!(manager.is_closed(conn_id).await);

        let result = manager.send_to_connection(conn_id, ServerMessage::Pong).await;
        assert_eq!(result.unwrap_err(), "Connection closed");
    }

    #[tokio::test]
    async fn test_cleanup_reaps_inactive_and_closed() {
        let manager = ConnectionManager::new();
        let stale = ConnectionId::new();
        let live = ConnectionId::new();

        let receiver = manager.create_connection(stale, guest("stale")).await;
        drop(receiver);
        let _live_receiver = manager.create_connection(live, guest("live")).await;

        manager
            .cleanup_inactive_connections(Duration::from_secs(300))
            .await;

        assert_eq!(manager.connection_count().await, 1);
        assert!(manager.identity(live).await.is_some());
    }

    #[tokio::test]
    async fn test_send_to_many_skips_closed() {
        let manager = ConnectionManager::new();
        let open = ConnectionId::new();
        let closed = ConnectionId::new();

        let mut open_receiver = manager.create_connection(open, guest("open")).await;
        let closed_receiver = manager.create_connection(closed, guest("closed")).await;
        drop(closed_receiver);

        manager
            .send_to_many(&[open, closed], &ServerMessage::Pong)
            .await;

        assert!(matches!(open_receiver.try_recv(), Ok(ServerMessage::Pong)));
    }
}
