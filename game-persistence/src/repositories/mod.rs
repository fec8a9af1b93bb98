pub mod game_repository;
pub mod learning_repository;
pub mod user_repository;

pub use game_repository::{GameRepository, NewRoundRecord, RoundStats};
pub use learning_repository::LearningRepository;
pub use user_repository::{LeaderboardEntry, UserRepository};
