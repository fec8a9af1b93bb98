use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::auth::AuthService;
use crate::learning::LearningManager;
use crate::lobby::LobbyManager;
use crate::match_coordinator::MatchCoordinator;
use game_core::CategoryStore;
use game_types::{AuthUser, ClientMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

#[allow(clippy::too_many_arguments)]
pub async fn handle_connection(
    websocket: WebSocket,
    token: Option<String>,
    connection_manager: Arc<ConnectionManager>,
    categories: Arc<CategoryStore>,
    lobby: Arc<LobbyManager>,
    coordinator: Arc<MatchCoordinator>,
    learning: Arc<LearningManager>,
    auth_service: Arc<AuthService>,
) {
    let connection_id = ConnectionId::new();

    // Identity is fixed at upgrade time; a bad or missing token plays
    // as an anonymous guest rather than being bounced.
    let identity = match token {
        Some(token) => match auth_service.validate_token(&token).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Token rejected for {}: {}; continuing as guest", connection_id, e);
                anonymous_guest()
            }
        },
        None => anonymous_guest(),
    };

    info!(
        "New WebSocket connection {} as {} (guest: {})",
        connection_id, identity.username, identity.is_guest
    );

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let mut rate_limiter = RateLimiter::new();

    let message_receiver = connection_manager
        .create_connection(connection_id, identity)
        .await;

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        categories,
        lobby,
        coordinator,
        learning,
    );

    // Handle incoming messages
    let incoming_handler = {
        let message_handler = message_handler.clone();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(e) =
                            handle_message(msg, &mut rate_limiter, &message_handler, connection_id)
                                .await
                        {
                            error!("Error handling message for {}: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {:?}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!("Failed to send message to {}: {:?}", connection_id, e);
                    break;
                }
            }
        }
    };

    // Run both handlers concurrently
    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id).await;
}

fn anonymous_guest() -> AuthUser {
    AuthUser::guest(format!("Guest_{}", rand::rng().random_range(1000..10_000)))
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !rate_limiter.allow() {
        warn!("Rate limit exceeded for connection {}", connection_id);
        return Err("Rate limit exceeded".into());
    }

    // Only handle text messages
    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| "Invalid text message")?;

    // Malformed frames get an error reply; the connection stays open
    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            message_handler
                .send_protocol_error(&format!("Invalid JSON message: {}", e))
                .await;
            return Ok(());
        }
    };

    message_handler
        .handle_message(client_message)
        .await
        .map_err(|e| format!("Message handling error: {}", e))?;

    Ok(())
}
