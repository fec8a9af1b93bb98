//! Persistence seams for the match coordinator and learning manager.
//!
//! The in-memory game state is the source of truth for live sessions;
//! every write here is best-effort. Failures are logged by the callers
//! and never crash a session.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use game_core::{EventProgress, PASSING_QUALITY, ReviewUpdate};
use game_persistence::repositories::{
    GameRepository, LearningRepository, NewRoundRecord, RoundStats, UserRepository,
};

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Current rating and games-played counter, if the user has a row.
    async fn load_rating(&self, user_id: Uuid) -> Result<Option<(i32, i32)>>;

    #[allow(clippy::too_many_arguments)]
    async fn create_game(
        &self,
        id: Uuid,
        category_key: &str,
        player1_id: Uuid,
        player2_id: Uuid,
        player1_elo: i32,
        player2_elo: i32,
        is_ranked: bool,
    ) -> Result<()>;

    async fn save_round(&self, game_id: Uuid, record: NewRoundRecord) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    async fn complete_game(
        &self,
        game_id: Uuid,
        player1_score: i32,
        player2_score: i32,
        winner_id: Option<Uuid>,
        player1_elo_after: Option<i32>,
        player2_elo_after: Option<i32>,
        end_reason: &str,
    ) -> Result<()>;

    async fn update_rating(&self, user_id: Uuid, new_elo: i32) -> Result<()>;

    async fn update_stats(
        &self,
        user_id: Uuid,
        game_score: i32,
        won: bool,
        stats: RoundStats,
    ) -> Result<()>;
}

#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn get_progress(&self, user_id: Uuid, category_key: &str) -> Result<Vec<EventProgress>>;

    #[allow(clippy::too_many_arguments)]
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        category_key: &str,
        event_name: &str,
        quality: u8,
        year_error: i32,
        distance_km: f64,
        review: &ReviewUpdate,
    ) -> Result<EventProgress>;
}

/// Production store backed by the sea-orm repositories.
pub struct SeaOrmStore {
    users: UserRepository,
    games: GameRepository,
    learning: LearningRepository,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            games: GameRepository::new(db.clone()),
            learning: LearningRepository::new(db),
        }
    }
}

#[async_trait]
impl MatchStore for SeaOrmStore {
    async fn load_rating(&self, user_id: Uuid) -> Result<Option<(i32, i32)>> {
        self.users.rating(user_id).await
    }

    async fn create_game(
        &self,
        id: Uuid,
        category_key: &str,
        player1_id: Uuid,
        player2_id: Uuid,
        player1_elo: i32,
        player2_elo: i32,
        is_ranked: bool,
    ) -> Result<()> {
        self.games
            .create_game(
                id,
                category_key,
                player1_id,
                player2_id,
                player1_elo,
                player2_elo,
                is_ranked,
            )
            .await?;
        Ok(())
    }

    async fn save_round(&self, game_id: Uuid, record: NewRoundRecord) -> Result<()> {
        self.games.save_round(game_id, record).await
    }

    async fn complete_game(
        &self,
        game_id: Uuid,
        player1_score: i32,
        player2_score: i32,
        winner_id: Option<Uuid>,
        player1_elo_after: Option<i32>,
        player2_elo_after: Option<i32>,
        end_reason: &str,
    ) -> Result<()> {
        self.games
            .complete_game(
                game_id,
                player1_score,
                player2_score,
                winner_id,
                player1_elo_after,
                player2_elo_after,
                end_reason,
            )
            .await
    }

    async fn update_rating(&self, user_id: Uuid, new_elo: i32) -> Result<()> {
        self.users.update_rating(user_id, new_elo).await
    }

    async fn update_stats(
        &self,
        user_id: Uuid,
        game_score: i32,
        won: bool,
        stats: RoundStats,
    ) -> Result<()> {
        self.games
            .update_stats_after_game(user_id, game_score, won, stats)
            .await
    }
}

#[async_trait]
impl LearningStore for SeaOrmStore {
    async fn get_progress(&self, user_id: Uuid, category_key: &str) -> Result<Vec<EventProgress>> {
        self.learning.get_progress(user_id, category_key).await
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        category_key: &str,
        event_name: &str,
        quality: u8,
        year_error: i32,
        distance_km: f64,
        review: &ReviewUpdate,
    ) -> Result<EventProgress> {
        self.learning
            .upsert_progress(
                user_id,
                category_key,
                event_name,
                quality,
                year_error,
                distance_km,
                review,
            )
            .await
    }
}

/// Store that persists nothing. Ratings resolve to the in-memory
/// identity values and progress records never survive the process.
pub struct NullStore;

#[async_trait]
impl MatchStore for NullStore {
    async fn load_rating(&self, _user_id: Uuid) -> Result<Option<(i32, i32)>> {
        Ok(None)
    }

    async fn create_game(
        &self,
        _id: Uuid,
        _category_key: &str,
        _player1_id: Uuid,
        _player2_id: Uuid,
        _player1_elo: i32,
        _player2_elo: i32,
        _is_ranked: bool,
    ) -> Result<()> {
        Ok(())
    }

    async fn save_round(&self, _game_id: Uuid, _record: NewRoundRecord) -> Result<()> {
        Ok(())
    }

    async fn complete_game(
        &self,
        _game_id: Uuid,
        _player1_score: i32,
        _player2_score: i32,
        _winner_id: Option<Uuid>,
        _player1_elo_after: Option<i32>,
        _player2_elo_after: Option<i32>,
        _end_reason: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn update_rating(&self, _user_id: Uuid, _new_elo: i32) -> Result<()> {
        Ok(())
    }

    async fn update_stats(
        &self,
        _user_id: Uuid,
        _game_score: i32,
        _won: bool,
        _stats: RoundStats,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl LearningStore for NullStore {
    async fn get_progress(
        &self,
        _user_id: Uuid,
        _category_key: &str,
    ) -> Result<Vec<EventProgress>> {
        Ok(Vec::new())
    }

    async fn upsert_progress(
        &self,
        _user_id: Uuid,
        _category_key: &str,
        event_name: &str,
        quality: u8,
        _year_error: i32,
        _distance_km: f64,
        review: &ReviewUpdate,
    ) -> Result<EventProgress> {
        let now = Utc::now();
        Ok(EventProgress {
            event_name: event_name.to_string(),
            ease_factor: review.ease_factor,
            interval_days: review.interval_days,
            repetitions: review.repetitions,
            last_quality: quality as i32,
            next_review: review.next_review,
            last_review: now,
            total_attempts: 1,
            successful_attempts: if quality >= PASSING_QUALITY { 1 } else { 0 },
        })
    }
}
