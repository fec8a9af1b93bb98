//! Per-category matchmaking lobbies.
//!
//! A connection joins a category's lobby, toggles ready, and leaves the
//! instant it is paired into a match or disconnects. Pairing happens
//! opportunistically when a player turns ready and via a periodic sweep
//! that also widens each waiting player's acceptable rating gap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_types::{AuthUser, GameError, LobbyPlayer, ServerMessage};

#[derive(Debug, Clone)]
pub struct LobbyEntry {
    pub connection_id: ConnectionId,
    pub user_id: Option<Uuid>,
    pub elo: i32,
    pub games_played: i32,
    pub is_guest: bool,
    pub username: String,
    pub avatar_url: Option<String>,
    pub ready: bool,
    pub ready_at: Option<Instant>,
    pub joined_at: Instant,
}

impl LobbyEntry {
    /// Stable identity used for invites and dedup. Guests have no user
    /// id, so each guest connection stands alone.
    pub fn identity_key(&self) -> String {
        match self.user_id {
            Some(user_id) => user_id.to_string(),
            None => format!("conn:{}", self.connection_id),
        }
    }

    pub fn to_lobby_player(&self) -> LobbyPlayer {
        LobbyPlayer {
            user_id: self.user_id,
            username: self.username.clone(),
            elo: self.elo,
            is_guest: self.is_guest,
            avatar_url: self.avatar_url.clone(),
            ready: self.ready,
        }
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            user_id: self.user_id,
            username: self.username.clone(),
            elo: self.elo,
            games_played: self.games_played,
            is_guest: self.is_guest,
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Two lobby members paired into a match.
#[derive(Debug, Clone)]
pub struct MatchPair {
    pub category_key: String,
    pub player1: LobbyEntry,
    pub player2: LobbyEntry,
}

#[derive(Debug, Clone)]
struct PendingInvite {
    category_key: String,
    created_at: Instant,
}

pub struct LobbyManager {
    lobbies: RwLock<HashMap<String, Vec<LobbyEntry>>>,
    // Keyed by the ordered (from, to) identity pair: at most one
    // outstanding invite per direction
    invites: RwLock<HashMap<(String, String), PendingInvite>>,
    connection_manager: Arc<ConnectionManager>,
    initial_range: i32,
    expansion_step: i32,
    expansion_interval: Duration,
    max_range: i32,
    invite_expiration: Duration,
}

impl LobbyManager {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self::new_with_config(
            connection_manager,
            100,
            50,
            Duration::from_secs(5),
            500,
            Duration::from_secs(60),
        )
    }

    pub fn new_with_config(
        connection_manager: Arc<ConnectionManager>,
        initial_range: i32,
        expansion_step: i32,
        expansion_interval: Duration,
        max_range: i32,
        invite_expiration: Duration,
    ) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            invites: RwLock::new(HashMap::new()),
            connection_manager,
            initial_range,
            expansion_step,
            expansion_interval,
            max_range,
            invite_expiration,
        }
    }

    /// Acceptable rating gap after waiting `wait` since turning ready.
    fn current_range(&self, wait: Duration) -> i32 {
        let expansions = (wait.as_millis() / self.expansion_interval.as_millis()) as i32;
        (self.initial_range + expansions * self.expansion_step).min(self.max_range)
    }

    /// Join a category lobby. Re-joining with the same registered user
    /// replaces the stale entry, so a page reload never leaves a ghost;
    /// entries whose connection has closed are purged as well.
    pub async fn join(
        &self,
        category_key: &str,
        connection_id: ConnectionId,
        identity: &AuthUser,
    ) -> LobbyPlayer {
        let entry = LobbyEntry {
            connection_id,
            user_id: if identity.is_guest { None } else { identity.user_id },
            elo: if identity.is_guest {
                AuthUser::GUEST_ELO
            } else {
                identity.elo
            },
            games_played: identity.games_played,
            is_guest: identity.is_guest,
            username: identity.username.clone(),
            avatar_url: identity.avatar_url.clone(),
            ready: false,
            ready_at: None,
            joined_at: Instant::now(),
        };
        let player = entry.to_lobby_player();

        {
            let mut lobbies = self.lobbies.write().await;
            let lobby = lobbies.entry(category_key.to_string()).or_default();

            let mut stale = Vec::new();
            for existing in lobby.iter() {
                let same_user =
                    entry.user_id.is_some() && existing.user_id == entry.user_id;
                if same_user || self.connection_manager.is_closed(existing.connection_id).await {
                    stale.push(existing.connection_id);
                }
            }
            lobby.retain(|e| !stale.contains(&e.connection_id));

            info!("{} joined lobby {}", entry.username, category_key);
            lobby.push(entry);
        }

        self.broadcast_lobby(category_key).await;
        player
    }

    /// Remove a connection from whatever lobby holds it, cancelling its
    /// invites in both directions.
    pub async fn leave(&self, connection_id: ConnectionId) -> Option<(String, LobbyEntry)> {
        let removed = {
            let mut lobbies = self.lobbies.write().await;
            let mut found = None;
            for (category_key, lobby) in lobbies.iter_mut() {
                if let Some(idx) = lobby.iter().position(|e| e.connection_id == connection_id) {
                    found = Some((category_key.clone(), lobby.remove(idx)));
                    break;
                }
            }
            found
        };

        if let Some((category_key, entry)) = &removed {
            self.cancel_invites_for(&entry.identity_key()).await;
            info!("{} left lobby {}", entry.username, category_key);
            self.broadcast_lobby(category_key).await;
        }

        removed
    }

    /// Toggle the ready flag. Turning ready immediately attempts an
    /// opportunistic match against other ready players at the initial
    /// rating band; turning not-ready cancels nothing else.
    pub async fn set_ready(
        &self,
        connection_id: ConnectionId,
        ready: bool,
    ) -> Result<Option<MatchPair>, GameError> {
        let (category_key, pair) = {
            let mut lobbies = self.lobbies.write().await;
            let (category_key, lobby) = lobbies
                .iter_mut()
                .find(|(_, lobby)| lobby.iter().any(|e| e.connection_id == connection_id))
                .ok_or(GameError::NotInLobby)?;
            let category_key = category_key.clone();

            let idx = lobby
                .iter()
                .position(|e| e.connection_id == connection_id)
                .expect("entry checked above");
            lobby[idx].ready = ready;
            lobby[idx].ready_at = if ready { Some(Instant::now()) } else { None };

            let pair = if ready {
                // Just became ready: no wait accrued yet
                let range = self.current_range(Duration::ZERO);
                Self::pair_off(lobby, idx, range).map(|(a, b)| MatchPair {
                    category_key: category_key.clone(),
                    player1: a,
                    player2: b,
                })
            } else {
                None
            };

            (category_key, pair)
        };

        if let Some(pair) = &pair {
            self.cancel_invites_for(&pair.player1.identity_key()).await;
            self.cancel_invites_for(&pair.player2.identity_key()).await;
        }
        self.broadcast_lobby(&category_key).await;
        Ok(pair)
    }

    /// Find the best opponent for `lobby[idx]` among the other ready
    /// entries and, on success, remove both from the lobby.
    ///
    /// Guests match unconditionally. Candidates prefer non-guests, then
    /// the closest rating; guest pairs fall back to longest-ready.
    fn pair_off(
        lobby: &mut Vec<LobbyEntry>,
        idx: usize,
        range: i32,
    ) -> Option<(LobbyEntry, LobbyEntry)> {
        let player = lobby[idx].clone();

        let mut candidates: Vec<usize> = lobby
            .iter()
            .enumerate()
            .filter(|(i, e)| *i != idx && e.ready)
            .filter(|(_, e)| {
                player.is_guest || e.is_guest || (e.elo - player.elo).abs() <= range
            })
            .map(|(i, _)| i)
            .collect();

        candidates.sort_by_key(|&i| {
            let candidate = &lobby[i];
            let guest_rank = if candidate.is_guest { 1 } else { 0 };
            let closeness = if candidate.is_guest && player.is_guest {
                candidate
                    .ready_at
                    .map(|t| t.elapsed().as_millis() as i64)
                    .map(|waited| -waited) // longest ready first
                    .unwrap_or(0)
            } else {
                (candidate.elo - player.elo).abs() as i64
            };
            (guest_rank, closeness)
        });

        let opponent_idx = *candidates.first()?;
        let opponent = lobby[opponent_idx].clone();

        lobby.retain(|e| {
            e.connection_id != player.connection_id && e.connection_id != opponent.connection_id
        });

        Some((player, opponent))
    }

    /// Send a direct invite to another member of the same lobby.
    pub async fn send_invite(
        &self,
        connection_id: ConnectionId,
        to_identity: &str,
    ) -> Result<LobbyPlayer, GameError> {
        let (category_key, from, to) = {
            let lobbies = self.lobbies.read().await;
            let (category_key, lobby) = lobbies
                .iter()
                .find(|(_, lobby)| lobby.iter().any(|e| e.connection_id == connection_id))
                .ok_or(GameError::NotInLobby)?;

            let from = lobby
                .iter()
                .find(|e| e.connection_id == connection_id)
                .expect("entry checked above")
                .clone();
            let to = lobby
                .iter()
                .find(|e| e.identity_key() == to_identity)
                .ok_or_else(|| GameError::PlayerNotInLobby {
                    user_id: to_identity.to_string(),
                })?
                .clone();

            (category_key.clone(), from, to)
        };

        if from.identity_key() == to.identity_key() {
            return Err(GameError::InviteYourself);
        }

        let invite_key = (from.identity_key(), to.identity_key());
        {
            let mut invites = self.invites.write().await;
            if invites.contains_key(&invite_key) {
                return Err(GameError::InviteAlreadySent);
            }
            invites.insert(
                invite_key,
                PendingInvite {
                    category_key,
                    created_at: Instant::now(),
                },
            );
        }

        let notification = ServerMessage::GameInvite {
            from: from.to_lobby_player(),
        };
        if self
            .connection_manager
            .send_to_connection(to.connection_id, notification)
            .await
            .is_err()
        {
            // Target vanished between lookup and send
            let mut invites = self.invites.write().await;
            invites.remove(&(from.identity_key(), to.identity_key()));
            return Err(GameError::PlayerNotInLobby {
                user_id: to_identity.to_string(),
            });
        }

        Ok(to.to_lobby_player())
    }

    /// Accept or decline an invite addressed to this connection.
    /// Accepting pulls both players out of the lobby; declining
    /// notifies the inviter. Expired invites fail either way.
    pub async fn respond_invite(
        &self,
        connection_id: ConnectionId,
        from_identity: &str,
        accept: bool,
    ) -> Result<Option<MatchPair>, GameError> {
        let (category_key, inviter, responder) = {
            let lobbies = self.lobbies.read().await;
            let (category_key, lobby) = lobbies
                .iter()
                .find(|(_, lobby)| lobby.iter().any(|e| e.connection_id == connection_id))
                .ok_or(GameError::NotInLobby)?;

            let responder = lobby
                .iter()
                .find(|e| e.connection_id == connection_id)
                .expect("entry checked above")
                .clone();
            let inviter = lobby
                .iter()
                .find(|e| e.identity_key() == from_identity)
                .ok_or_else(|| GameError::PlayerNotInLobby {
                    user_id: from_identity.to_string(),
                })?
                .clone();

            (category_key.clone(), inviter, responder)
        };

        let invite_key = (inviter.identity_key(), responder.identity_key());
        let invite = {
            let mut invites = self.invites.write().await;
            invites.remove(&invite_key).ok_or(GameError::InviteNotFound)?
        };

        if invite.created_at.elapsed() > self.invite_expiration {
            return Err(GameError::InviteExpired);
        }

        if !accept {
            let _ = self
                .connection_manager
                .send_to_connection(
                    inviter.connection_id,
                    ServerMessage::InviteDeclined {
                        by: responder.to_lobby_player(),
                    },
                )
                .await;
            return Ok(None);
        }

        {
            let mut lobbies = self.lobbies.write().await;
            if let Some(lobby) = lobbies.get_mut(&invite.category_key) {
                lobby.retain(|e| {
                    e.connection_id != inviter.connection_id
                        && e.connection_id != responder.connection_id
                });
            }
        }
        self.cancel_invites_for(&inviter.identity_key()).await;
        self.cancel_invites_for(&responder.identity_key()).await;
        self.broadcast_lobby(&category_key).await;

        Ok(Some(MatchPair {
            category_key: invite.category_key,
            player1: inviter,
            player2: responder,
        }))
    }

    async fn cancel_invites_for(&self, identity: &str) {
        let mut invites = self.invites.write().await;
        invites.retain(|(from, to), _| from != identity && to != identity);
    }

    /// Periodic pass over every lobby: prune closed connections, pair
    /// ready players (longest-ready first, with their widened rating
    /// band), and expire stale invites. Returns the pairs formed.
    pub async fn sweep(&self) -> Vec<MatchPair> {
        let mut pairs = Vec::new();
        let mut changed_categories = Vec::new();

        {
            let mut lobbies = self.lobbies.write().await;
            for (category_key, lobby) in lobbies.iter_mut() {
                let mut closed = Vec::new();
                for entry in lobby.iter() {
                    if self.connection_manager.is_closed(entry.connection_id).await {
                        closed.push(entry.connection_id);
                    }
                }
                if !closed.is_empty() {
                    lobby.retain(|e| !closed.contains(&e.connection_id));
                    changed_categories.push(category_key.clone());
                }

                // One pass, longest-ready players initiating first;
                // entries paired earlier in the pass are gone by the
                // time later initiators look for opponents.
                let mut ready: Vec<(ConnectionId, Instant)> = lobby
                    .iter()
                    .filter_map(|e| e.ready_at.map(|t| (e.connection_id, t)))
                    .collect();
                ready.sort_by_key(|(_, ready_at)| *ready_at);

                for (conn_id, ready_at) in ready {
                    let Some(idx) = lobby.iter().position(|e| e.connection_id == conn_id)
                    else {
                        continue; // already matched this pass
                    };
                    let range = self.current_range(ready_at.elapsed());
                    if let Some((a, b)) = Self::pair_off(lobby, idx, range) {
                        pairs.push(MatchPair {
                            category_key: category_key.clone(),
                            player1: a,
                            player2: b,
                        });
                        changed_categories.push(category_key.clone());
                    }
                }
            }
        }

        for pair in &pairs {
            self.cancel_invites_for(&pair.player1.identity_key()).await;
            self.cancel_invites_for(&pair.player2.identity_key()).await;
        }

        {
            let mut invites = self.invites.write().await;
            let expiration = self.invite_expiration;
            invites.retain(|(from, to), invite| {
                let keep = invite.created_at.elapsed() <= expiration;
                if !keep {
                    warn!("Expiring invite {} -> {}", from, to);
                }
                keep
            });
        }

        changed_categories.sort();
        changed_categories.dedup();
        for category_key in changed_categories {
            self.broadcast_lobby(&category_key).await;
        }

        pairs
    }

    /// Current members sorted by rating descending.
    pub async fn players_in_lobby(&self, category_key: &str) -> Vec<LobbyPlayer> {
        let lobbies = self.lobbies.read().await;
        let Some(lobby) = lobbies.get(category_key) else {
            return Vec::new();
        };

        let mut players: Vec<LobbyPlayer> = lobby.iter().map(|e| e.to_lobby_player()).collect();
        players.sort_by(|a, b| b.elo.cmp(&a.elo));
        players
    }

    async fn broadcast_lobby(&self, category_key: &str) {
        let players = self.players_in_lobby(category_key).await;
        let ready_count = players.iter().filter(|p| p.ready).count() as u32;
        let total_count = players.len() as u32;

        let recipients: Vec<ConnectionId> = {
            let lobbies = self.lobbies.read().await;
            lobbies
                .get(category_key)
                .map(|lobby| lobby.iter().map(|e| e.connection_id).collect())
                .unwrap_or_default()
        };

        let message = ServerMessage::LobbyPlayers {
            players,
            ready_count,
            total_count,
        };
        self.connection_manager
            .send_to_many(&recipients, &message)
            .await;
    }

    pub async fn lobby_size(&self, category_key: &str) -> usize {
        let lobbies = self.lobbies.read().await;
        lobbies.get(category_key).map(|l| l.len()).unwrap_or(0)
    }

    pub async fn ready_count(&self, category_key: &str) -> usize {
        let lobbies = self.lobbies.read().await;
        lobbies
            .get(category_key)
            .map(|l| l.iter().filter(|e| e.ready).count())
            .unwrap_or(0)
    }

    pub async fn pending_invite_count(&self) -> usize {
        let invites = self.invites.read().await;
        invites.len()
    }
}
