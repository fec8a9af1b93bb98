use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    CategorySummary, Event, FinalScore, Learnedness, LearningStats, LobbyPlayer, MatchEndReason,
    MatchParticipant, PlayerRoundResult, ProgressSummary,
};

/// Messages the client sends over the WebSocket. Tagged with a `type`
/// field matching the original wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
#[ts(export)]
pub enum ClientMessage {
    JoinLobby { category_key: String },
    LeaveLobby,
    SetReady { ready: bool },
    SendInvite { to_user_id: String },
    RespondInvite { from_user_id: String, accept: bool },
    StartPractice { category_key: String },
    SubmitAnswer {
        guess_lat: f64,
        guess_lng: f64,
        guess_year: i32,
        time_left: f64,
    },
    ReadyForRound,
    ReadyNextRound,
    Ping,
    LearningStart { category_key: String },
    LearningNext,
    LearningSubmit {
        guess_lat: f64,
        guess_lng: f64,
        guess_year: i32,
    },
}

/// Messages the server sends over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
#[ts(export)]
pub enum ServerMessage {
    LobbyJoined {
        category_key: String,
        player: LobbyPlayer,
    },
    LobbyPlayers {
        players: Vec<LobbyPlayer>,
        ready_count: u32,
        total_count: u32,
    },
    ReadyStatus { ready: bool },
    GameInvite { from: LobbyPlayer },
    InviteSent { to_user_id: String },
    InviteDeclined { by: LobbyPlayer },
    MatchFound {
        match_id: String,
        category_key: String,
        players: Vec<MatchParticipant>,
        is_ranked: bool,
    },
    GameStarting,
    PrepareRound { round: u32, event: Event },
    RoundStart { round: u32 },
    AnswerReceived {
        round_score: i32,
        total_score: i32,
        distance_km: f64,
        year_error: i32,
    },
    RoundResults {
        results: Vec<PlayerRoundResult>,
        correct_answer: Event,
    },
    GameOver {
        final_scores: Vec<FinalScore>,
        reason: MatchEndReason,
    },
    Pong,
    LearningStarted {
        category: CategorySummary,
        stats: LearningStats,
    },
    LearningEvent {
        event_name: String,
        progress: Option<ProgressSummary>,
        learnedness: Learnedness,
    },
    LearningResult {
        correct_answer: Event,
        distance_km: f64,
        year_error: i32,
        quality: u8,
        learnedness: Learnedness,
        next_review: String,
        interval_days: i32,
        stats: LearningStats,
    },
    Error { message: String },
}
