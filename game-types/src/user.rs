use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Authenticated identity resolved from the bearer token at connection
/// time. Guests have no user id and a pinned default rating.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthUser {
    pub user_id: Option<Uuid>,
    pub username: String,
    pub elo: i32,
    pub games_played: i32,
    pub is_guest: bool,
    pub avatar_url: Option<String>,
}

impl AuthUser {
    /// Default rating assigned to guests; guest ratings are never
    /// authoritative for matchmaking.
    pub const GUEST_ELO: i32 = 1000;

    pub fn guest(username: String) -> Self {
        AuthUser {
            user_id: None,
            username,
            elo: Self::GUEST_ELO,
            games_played: 0,
            is_guest: true,
            avatar_url: None,
        }
    }
}

/// Lobby membership summary broadcast to every player in a category
/// lobby, sorted by rating descending.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LobbyPlayer {
    pub user_id: Option<Uuid>,
    pub username: String,
    pub elo: i32,
    pub is_guest: bool,
    pub avatar_url: Option<String>,
    pub ready: bool,
}
