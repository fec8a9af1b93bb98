use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single historical event players guess at. Immutable, sourced from
/// the category dataset at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Event {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub year: i32,
    pub location: String,
}

/// A category of events plus the map/timeline bounds the client uses to
/// render it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub key: String,
    pub name: String,
    pub description: String,
    pub map_center: [f64; 2],
    pub map_zoom: u8,
    pub timeline_min: i32,
    pub timeline_max: i32,
    pub events: Vec<Event>,
}

/// Category metadata without the event list. Used wherever the correct
/// answers must not ride along (learning mode).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategorySummary {
    pub key: String,
    pub name: String,
    pub description: String,
    pub map_center: [f64; 2],
    pub map_zoom: u8,
    pub timeline_min: i32,
    pub timeline_max: i32,
    pub event_count: u32,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        CategorySummary {
            key: category.key.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            map_center: category.map_center,
            map_zoom: category.map_zoom,
            timeline_min: category.timeline_min,
            timeline_max: category.timeline_max,
            event_count: category.events.len() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MatchStatus {
    Waiting,
    Playing,
}

/// Why a match ended. The original server ended disconnected matches
/// through the normal game-over path without telling the survivor;
/// the reason is carried explicitly so clients can distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MatchEndReason {
    Completed,
    PlayerDisconnected,
}

/// One recorded answer for one round. Immutable once stored; a second
/// submission for the same round is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Answer {
    pub guess_lat: f64,
    pub guess_lng: f64,
    pub guess_year: i32,
    pub time_left: f64,
    pub round_score: i32,
    pub distance_km: f64,
    pub year_error: i32,
    pub submitted_at: String, // ISO 8601 string
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GuessSummary {
    pub lat: f64,
    pub lng: f64,
    pub year: i32,
}

/// Per-player entry in a round_results broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayerRoundResult {
    pub player_id: String,
    pub player_name: String,
    pub total_score: i32,
    pub round_score: i32,
    pub guess: GuessSummary,
    pub distance: i64, // whole kilometers
    pub year_error: i32,
}

/// Per-player entry in a game_over broadcast, sorted by score
/// descending. ELO fields are present only for ranked matches.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FinalScore {
    pub player_id: String,
    pub player_name: String,
    pub total_score: i32,
    pub elo_change: Option<i32>,
    pub new_elo: Option<i32>,
}

/// Participant summary sent with match_found.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MatchParticipant {
    pub player_id: String,
    pub display_name: String,
    pub elo: i32,
    pub is_guest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LearnednessLevel {
    New,
    Learning,
    Mastered,
}

/// Derived 0-100% progress indicator for one event, for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Learnedness {
    pub level: LearnednessLevel,
    pub percentage: u8,
}

/// Aggregate learning stats for a category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LearningStats {
    pub total_events: u32,
    pub seen: u32,
    pub mastered: u32,
    pub due: u32,
    pub category_learnedness: u8,
}

/// Spaced-repetition progress metadata as exposed on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProgressSummary {
    pub repetitions: i32,
    pub interval_days: i32,
    pub ease_factor: f64,
    pub next_review: Option<String>, // ISO 8601 string
    pub total_attempts: i32,
    pub successful_attempts: i32,
}
