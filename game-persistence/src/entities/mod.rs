pub mod game_rounds;
pub mod games;
pub mod prelude;
pub mod user_event_progress;
pub mod user_stats;
pub mod users;
