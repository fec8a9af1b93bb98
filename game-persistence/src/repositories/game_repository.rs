use anyhow::Result;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::entities::{game_rounds, games, prelude::*, user_stats};

pub struct GameRepository {
    db: DatabaseConnection,
}

/// One archived round, both players' answers against the round's event.
#[derive(Debug, Clone)]
pub struct NewRoundRecord {
    pub round_number: i32,
    pub event_name: String,
    pub event_lat: f64,
    pub event_lng: f64,
    pub event_year: i32,
    pub player1_guess_lat: f64,
    pub player1_guess_lng: f64,
    pub player1_guess_year: i32,
    pub player1_distance_km: f64,
    pub player1_year_error: i32,
    pub player1_time_left: f64,
    pub player1_score: i32,
    pub player2_guess_lat: f64,
    pub player2_guess_lng: f64,
    pub player2_guess_year: i32,
    pub player2_distance_km: f64,
    pub player2_year_error: i32,
    pub player2_time_left: f64,
    pub player2_score: i32,
}

/// Per-match aggregates folded into a player's lifetime stats.
#[derive(Debug, Clone, Copy)]
pub struct RoundStats {
    pub total_score: i32,
    pub total_distance_error: f64,
    pub total_year_error: i32,
    pub round_count: i32,
    pub best_round_score: i32,
}

impl GameRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_game(
        &self,
        id: Uuid,
        category_key: &str,
        player1_id: Uuid,
        player2_id: Uuid,
        player1_elo_before: i32,
        player2_elo_before: i32,
        is_ranked: bool,
    ) -> Result<Uuid> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();
        let game = games::ActiveModel {
            id: ActiveValue::Set(id),
            category_key: ActiveValue::Set(category_key.to_string()),
            player1_id: ActiveValue::Set(player1_id),
            player2_id: ActiveValue::Set(player2_id),
            player1_score: ActiveValue::Set(0),
            player2_score: ActiveValue::Set(0),
            player1_elo_before: ActiveValue::Set(player1_elo_before),
            player2_elo_before: ActiveValue::Set(player2_elo_before),
            player1_elo_after: ActiveValue::Set(None),
            player2_elo_after: ActiveValue::Set(None),
            winner_id: ActiveValue::Set(None),
            is_ranked: ActiveValue::Set(is_ranked),
            end_reason: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            completed_at: ActiveValue::Set(None),
        };

        Games::insert(game).exec(&self.db).await?;
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn complete_game(
        &self,
        game_id: Uuid,
        player1_score: i32,
        player2_score: i32,
        winner_id: Option<Uuid>,
        player1_elo_after: Option<i32>,
        player2_elo_after: Option<i32>,
        end_reason: &str,
    ) -> Result<()> {
        let game = Games::find_by_id(game_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Game not found"))?;

        let mut updated: games::ActiveModel = game.into();
        updated.player1_score = ActiveValue::Set(player1_score);
        updated.player2_score = ActiveValue::Set(player2_score);
        updated.winner_id = ActiveValue::Set(winner_id);
        updated.player1_elo_after = ActiveValue::Set(player1_elo_after);
        updated.player2_elo_after = ActiveValue::Set(player2_elo_after);
        updated.end_reason = ActiveValue::Set(Some(end_reason.to_string()));
        updated.completed_at = ActiveValue::Set(Some(chrono::Utc::now().into()));

        Games::update(updated).exec(&self.db).await?;
        Ok(())
    }

    pub async fn save_round(&self, game_id: Uuid, record: NewRoundRecord) -> Result<()> {
        let round = game_rounds::ActiveModel {
            id: ActiveValue::NotSet,
            game_id: ActiveValue::Set(game_id),
            round_number: ActiveValue::Set(record.round_number),
            event_name: ActiveValue::Set(record.event_name),
            event_lat: ActiveValue::Set(record.event_lat),
            event_lng: ActiveValue::Set(record.event_lng),
            event_year: ActiveValue::Set(record.event_year),
            player1_guess_lat: ActiveValue::Set(Some(record.player1_guess_lat)),
            player1_guess_lng: ActiveValue::Set(Some(record.player1_guess_lng)),
            player1_guess_year: ActiveValue::Set(Some(record.player1_guess_year)),
            player1_distance_km: ActiveValue::Set(Some(record.player1_distance_km)),
            player1_year_error: ActiveValue::Set(Some(record.player1_year_error)),
            player1_time_left: ActiveValue::Set(Some(record.player1_time_left)),
            player1_score: ActiveValue::Set(Some(record.player1_score)),
            player2_guess_lat: ActiveValue::Set(Some(record.player2_guess_lat)),
            player2_guess_lng: ActiveValue::Set(Some(record.player2_guess_lng)),
            player2_guess_year: ActiveValue::Set(Some(record.player2_guess_year)),
            player2_distance_km: ActiveValue::Set(Some(record.player2_distance_km)),
            player2_year_error: ActiveValue::Set(Some(record.player2_year_error)),
            player2_time_left: ActiveValue::Set(Some(record.player2_time_left)),
            player2_score: ActiveValue::Set(Some(record.player2_score)),
        };

        GameRounds::insert(round).exec(&self.db).await?;
        Ok(())
    }

    /// Fold a finished match into the player's lifetime aggregates,
    /// creating the stats row on first sight.
    pub async fn update_stats_after_game(
        &self,
        user_id: Uuid,
        game_score: i32,
        won: bool,
        round_stats: RoundStats,
    ) -> Result<()> {
        let existing = UserStats::find_by_id(user_id).one(&self.db).await?;
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        match existing {
            Some(stats) => {
                let new_streak = if won { stats.current_win_streak + 1 } else { 0 };
                let mut updated: user_stats::ActiveModel = stats.clone().into();
                updated.total_games = ActiveValue::Set(stats.total_games + 1);
                updated.wins = ActiveValue::Set(stats.wins + if won { 1 } else { 0 });
                updated.losses = ActiveValue::Set(stats.losses + if won { 0 } else { 1 });
                updated.total_score =
                    ActiveValue::Set(stats.total_score + round_stats.total_score);
                updated.total_distance_error = ActiveValue::Set(
                    stats.total_distance_error + round_stats.total_distance_error,
                );
                updated.total_year_error =
                    ActiveValue::Set(stats.total_year_error + round_stats.total_year_error);
                updated.total_rounds =
                    ActiveValue::Set(stats.total_rounds + round_stats.round_count);
                updated.best_round_score = ActiveValue::Set(
                    stats.best_round_score.max(round_stats.best_round_score),
                );
                updated.best_game_score =
                    ActiveValue::Set(stats.best_game_score.max(game_score));
                updated.current_win_streak = ActiveValue::Set(new_streak);
                updated.best_win_streak =
                    ActiveValue::Set(stats.best_win_streak.max(new_streak));
                updated.updated_at = ActiveValue::Set(now);

                UserStats::update(updated).exec(&self.db).await?;
            }
            None => {
                let streak = if won { 1 } else { 0 };
                let stats = user_stats::ActiveModel {
                    user_id: ActiveValue::Set(user_id),
                    total_games: ActiveValue::Set(1),
                    wins: ActiveValue::Set(if won { 1 } else { 0 }),
                    losses: ActiveValue::Set(if won { 0 } else { 1 }),
                    total_score: ActiveValue::Set(round_stats.total_score),
                    total_distance_error: ActiveValue::Set(round_stats.total_distance_error),
                    total_year_error: ActiveValue::Set(round_stats.total_year_error),
                    total_rounds: ActiveValue::Set(round_stats.round_count),
                    best_round_score: ActiveValue::Set(round_stats.best_round_score),
                    best_game_score: ActiveValue::Set(game_score),
                    current_win_streak: ActiveValue::Set(streak),
                    best_win_streak: ActiveValue::Set(streak),
                    updated_at: ActiveValue::Set(now),
                };
                UserStats::insert(stats).exec(&self.db).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_db() -> GameRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        GameRepository::new(db)
    }

    fn test_round(round_number: i32) -> NewRoundRecord {
        NewRoundRecord {
            round_number,
            event_name: "The Battle of Waterloo".to_string(),
            event_lat: 50.68,
            event_lng: 4.4114,
            event_year: 1815,
            player1_guess_lat: 50.0,
            player1_guess_lng: 4.0,
            player1_guess_year: 1815,
            player1_distance_km: 80.0,
            player1_year_error: 0,
            player1_time_left: 12.0,
            player1_score: 990,
            player2_guess_lat: 40.0,
            player2_guess_lng: -3.0,
            player2_guess_year: 1700,
            player2_distance_km: 1300.0,
            player2_year_error: 115,
            player2_time_left: 2.0,
            player2_score: 430,
        }
    }

    #[tokio::test]
    async fn test_game_lifecycle() {
        let repo = setup_test_db().await;
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        repo.create_game(game_id, "battles", p1, p2, 1000, 1050, true)
            .await
            .unwrap();

        repo.save_round(game_id, test_round(1)).await.unwrap();
        repo.save_round(game_id, test_round(2)).await.unwrap();

        repo.complete_game(game_id, 9900, 4300, Some(p1), Some(1016), Some(1034), "completed")
            .await
            .unwrap();

        let game = Games::find_by_id(game_id)
            .one(repo.db())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(game.player1_score, 9900);
        assert_eq!(game.winner_id, Some(p1));
        assert_eq!(game.player1_elo_after, Some(1016));
        assert_eq!(game.end_reason.as_deref(), Some("completed"));
        assert!(game.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_stats_upsert_and_streaks() {
        let repo = setup_test_db().await;
        let user = Uuid::new_v4();
        let stats = RoundStats {
            total_score: 5000,
            total_distance_error: 3200.0,
            total_year_error: 140,
            round_count: 10,
            best_round_score: 980,
        };

        // First game creates the row
        repo.update_stats_after_game(user, 5000, true, stats)
            .await
            .unwrap();
        // Second win extends the streak
        repo.update_stats_after_game(user, 6000, true, stats)
            .await
            .unwrap();
        // A loss resets it
        repo.update_stats_after_game(user, 4000, false, stats)
            .await
            .unwrap();

        let row = UserStats::find_by_id(user)
            .one(repo.db())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.total_games, 3);
        assert_eq!(row.wins, 2);
        assert_eq!(row.losses, 1);
        assert_eq!(row.total_rounds, 30);
        assert_eq!(row.best_game_score, 6000);
        assert_eq!(row.current_win_streak, 0);
        assert_eq!(row.best_win_streak, 2);
    }
}

#[cfg(test)]
impl GameRepository {
    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
