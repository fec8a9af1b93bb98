use std::sync::Arc;

use tracing::{error, info};

use crate::learning::LearningManager;
use crate::lobby::{LobbyManager, MatchPair};
use crate::match_coordinator::MatchCoordinator;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_core::CategoryStore;
use game_types::{AuthUser, ClientMessage, GameError, ServerMessage};

/// Routes one connection's inbound messages to the lobby, match
/// coordinator, and learning manager. Every protocol failure turns
/// into an error message back to the sender; nothing here closes the
/// connection.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    categories: Arc<CategoryStore>,
    lobby: Arc<LobbyManager>,
    coordinator: Arc<MatchCoordinator>,
    learning: Arc<LearningManager>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        categories: Arc<CategoryStore>,
        lobby: Arc<LobbyManager>,
        coordinator: Arc<MatchCoordinator>,
        learning: Arc<LearningManager>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            categories,
            lobby,
            coordinator,
            learning,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        match message {
            ClientMessage::JoinLobby { category_key } => self.handle_join_lobby(category_key).await,
            ClientMessage::LeaveLobby => self.handle_leave_lobby().await,
            ClientMessage::SetReady { ready } => self.handle_set_ready(ready).await,
            ClientMessage::SendInvite { to_user_id } => self.handle_send_invite(to_user_id).await,
            ClientMessage::RespondInvite {
                from_user_id,
                accept,
            } => self.handle_respond_invite(from_user_id, accept).await,
            ClientMessage::StartPractice { category_key } => {
                self.handle_start_practice(category_key).await
            }
            ClientMessage::SubmitAnswer {
                guess_lat,
                guess_lng,
                guess_year,
                time_left,
            } => {
                self.forward(
                    self.coordinator
                        .handle_submit_answer(
                            self.connection_id,
                            guess_lat,
                            guess_lng,
                            guess_year,
                            time_left,
                        )
                        .await,
                )
                .await
            }
            ClientMessage::ReadyForRound => {
                self.forward(
                    self.coordinator
                        .handle_ready_for_round(self.connection_id)
                        .await,
                )
                .await
            }
            ClientMessage::ReadyNextRound => {
                self.forward(
                    self.coordinator
                        .handle_ready_next_round(self.connection_id)
                        .await,
                )
                .await
            }
            ClientMessage::Ping => self.send_message(ServerMessage::Pong).await,
            ClientMessage::LearningStart { category_key } => {
                self.handle_learning_start(category_key).await
            }
            ClientMessage::LearningNext => {
                let result = self.learning.next_event(self.connection_id).await;
                self.reply(result).await
            }
            ClientMessage::LearningSubmit {
                guess_lat,
                guess_lng,
                guess_year,
            } => {
                let result = self
                    .learning
                    .submit(self.connection_id, guess_lat, guess_lng, guess_year)
                    .await;
                self.reply(result).await
            }
        }
    }

    /// Connection closed: leave the lobby, terminate any live match,
    /// and drop the learning session.
    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);

        self.lobby.leave(self.connection_id).await;
        self.coordinator.handle_disconnect(self.connection_id).await;
        self.learning.end_session(self.connection_id).await;
    }

    async fn handle_join_lobby(&self, category_key: String) -> Result<(), String> {
        if !self.categories.contains(&category_key) {
            return self
                .send_error(&GameError::CategoryNotFound { key: category_key }.to_string())
                .await;
        }

        let identity = self.identity().await?;
        let player = self
            .lobby
            .join(&category_key, self.connection_id, &identity)
            .await;

        self.send_message(ServerMessage::LobbyJoined {
            category_key,
            player,
        })
        .await
    }

    async fn handle_leave_lobby(&self) -> Result<(), String> {
        if self.lobby.leave(self.connection_id).await.is_none() {
            return self.send_error(&GameError::NotInLobby.to_string()).await;
        }
        Ok(())
    }

    async fn handle_set_ready(&self, ready: bool) -> Result<(), String> {
        match self.lobby.set_ready(self.connection_id, ready).await {
            Ok(pair) => {
                self.send_message(ServerMessage::ReadyStatus { ready }).await?;
                if let Some(pair) = pair {
                    self.launch_match(pair).await;
                }
                Ok(())
            }
            Err(e) => self.send_error(&e.to_string()).await,
        }
    }

    async fn handle_send_invite(&self, to_user_id: String) -> Result<(), String> {
        match self.lobby.send_invite(self.connection_id, &to_user_id).await {
            Ok(_target) => {
                self.send_message(ServerMessage::InviteSent { to_user_id })
                    .await
            }
            Err(e) => self.send_error(&e.to_string()).await,
        }
    }

    async fn handle_respond_invite(
        &self,
        from_user_id: String,
        accept: bool,
    ) -> Result<(), String> {
        match self
            .lobby
            .respond_invite(self.connection_id, &from_user_id, accept)
            .await
        {
            Ok(Some(pair)) => {
                self.launch_match(pair).await;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => self.send_error(&e.to_string()).await,
        }
    }

    async fn handle_start_practice(&self, category_key: String) -> Result<(), String> {
        let identity = self.identity().await?;
        let result = self
            .coordinator
            .create_match(&category_key, vec![(self.connection_id, identity)])
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => self.send_error(&e.to_string()).await,
        }
    }

    async fn handle_learning_start(&self, category_key: String) -> Result<(), String> {
        let identity = self.identity().await?;
        let result = self
            .learning
            .start(self.connection_id, &category_key, &identity)
            .await;
        self.reply(result).await
    }

    /// Spin up a match from a lobby pairing. If creation fails the
    /// players have already left the lobby; tell them why.
    async fn launch_match(&self, pair: MatchPair) {
        let participants = vec![
            (pair.player1.connection_id, pair.player1.to_auth_user()),
            (pair.player2.connection_id, pair.player2.to_auth_user()),
        ];
        let conns = [pair.player1.connection_id, pair.player2.connection_id];

        if let Err(e) = self
            .coordinator
            .create_match(&pair.category_key, participants)
            .await
        {
            error!("Failed to create match from pairing: {}", e);
            for conn in conns {
                let _ = self
                    .connection_manager
                    .send_to_connection(
                        conn,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    async fn identity(&self) -> Result<AuthUser, String> {
        self.connection_manager
            .identity(self.connection_id)
            .await
            .ok_or_else(|| "Connection not found".to_string())
    }

    async fn reply(&self, result: Result<ServerMessage, GameError>) -> Result<(), String> {
        match result {
            Ok(message) => self.send_message(message).await,
            Err(e) => self.send_error(&e.to_string()).await,
        }
    }

    async fn forward(&self, result: Result<(), GameError>) -> Result<(), String> {
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.send_error(&e.to_string()).await,
        }
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }

    /// Error reply for frames that never parsed into a ClientMessage.
    pub async fn send_protocol_error(&self, message: &str) {
        let _ = self.send_error(message).await;
    }

    async fn send_error(&self, error_message: &str) -> Result<(), String> {
        self.send_message(ServerMessage::Error {
            message: error_message.to_string(),
        })
        .await
    }
}
