use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Protocol-level failures. All of these are scoped to the offending
/// connection: the sender gets an error message, no state changes, and
/// the connection stays open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GameError {
    CategoryNotFound { key: String },
    NotInLobby,
    PlayerNotInLobby { user_id: String },
    InviteYourself,
    InviteAlreadySent,
    InviteNotFound,
    InviteExpired,
    MatchNotFound,
    InvalidMatchSize { players: u32 },
    PlayerNotInMatch,
    NoActiveRound,
    AnswerAlreadySubmitted { round: u32 },
    NoCurrentEvent,
    NoLearningSession,
    IdentityRequired,
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::CategoryNotFound { key } => write!(f, "Unknown category: {}", key),
            GameError::NotInLobby => write!(f, "You are not in a lobby"),
            GameError::PlayerNotInLobby { user_id } => {
                write!(f, "Player {} is not in the lobby", user_id)
            }
            GameError::InviteYourself => write!(f, "Cannot invite yourself"),
            GameError::InviteAlreadySent => write!(f, "Invite already sent"),
            GameError::InviteNotFound => write!(f, "Invite not found"),
            GameError::InviteExpired => write!(f, "Invite expired"),
            GameError::MatchNotFound => write!(f, "Match not found"),
            GameError::InvalidMatchSize { players } => {
                write!(f, "Invalid number of players: {}", players)
            }
            GameError::PlayerNotInMatch => write!(f, "You are not in this match"),
            GameError::NoActiveRound => write!(f, "No round in progress"),
            GameError::AnswerAlreadySubmitted { round } => {
                write!(f, "Answer for round {} already submitted", round)
            }
            GameError::NoCurrentEvent => write!(f, "Request the next event first"),
            GameError::NoLearningSession => write!(f, "Start learning mode first"),
            GameError::IdentityRequired => {
                write!(f, "Learning mode requires a signed-in account")
            }
        }
    }
}

impl std::error::Error for GameError {}

/// Connection-level failures reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ConnectionError {
    InvalidToken,
    TokenExpired,
    RateLimitExceeded,
    InternalError { message: String },
}
