pub use super::game_rounds::Entity as GameRounds;
pub use super::games::Entity as Games;
pub use super::user_event_progress::Entity as UserEventProgress;
pub use super::user_stats::Entity as UserStats;
pub use super::users::Entity as Users;
