use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use game_core::CategoryStore;
use game_server::match_coordinator::MatchCoordinator;
use game_server::store::{MatchStore, NullStore};
use game_server::websocket::ConnectionManager;
use game_server::websocket::connection::ConnectionId;
use game_types::{AuthUser, ServerMessage};

pub fn registered(name: &str, elo: i32, games_played: i32) -> AuthUser {
    AuthUser {
        user_id: Some(Uuid::new_v4()),
        username: name.to_string(),
        elo,
        games_played,
        is_guest: false,
        avatar_url: None,
    }
}

pub fn guest(name: &str) -> AuthUser {
    AuthUser::guest(name.to_string())
}

pub async fn connect(
    manager: &ConnectionManager,
    identity: &AuthUser,
) -> (ConnectionId, UnboundedReceiver<ServerMessage>) {
    let id = ConnectionId::new();
    let receiver = manager.create_connection(id, identity.clone()).await;
    (id, receiver)
}

pub fn test_categories() -> Arc<CategoryStore> {
    Arc::new(CategoryStore::with_default_categories().unwrap())
}

/// Coordinator with zero announce delays so tests drive rounds without
/// sleeping.
pub fn test_coordinator(
    categories: Arc<CategoryStore>,
    connection_manager: Arc<ConnectionManager>,
    store: Arc<dyn MatchStore>,
) -> Arc<MatchCoordinator> {
    Arc::new(MatchCoordinator::new_with_config(
        categories,
        connection_manager,
        store,
        Duration::ZERO,
        Duration::ZERO,
    ))
}

pub fn test_coordinator_unpersisted(
    categories: Arc<CategoryStore>,
    connection_manager: Arc<ConnectionManager>,
) -> Arc<MatchCoordinator> {
    test_coordinator(categories, connection_manager, Arc::new(NullStore))
}

/// Await the next message matching `pred`, discarding everything else.
pub async fn wait_for<F>(receiver: &mut UnboundedReceiver<ServerMessage>, pred: F) -> ServerMessage
where
    F: Fn(&ServerMessage) -> bool,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .expect("timed out waiting for message")
            .expect("channel closed while waiting for message");
        if pred(&message) {
            return message;
        }
    }
}
