use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entities::{prelude::*, users};
use game_types::AuthUser;

pub struct UserRepository {
    db: DatabaseConnection,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub elo_rating: i32,
    pub games_played: i32,
    pub rank: u32,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_auth_user(model: users::Model) -> AuthUser {
        AuthUser {
            user_id: Some(model.id),
            username: model.username,
            elo: model.elo_rating,
            games_played: model.games_played,
            is_guest: model.is_guest,
            avatar_url: model.avatar_url,
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>> {
        let user_model = Users::find_by_id(id).one(&self.db).await?;
        Ok(user_model.map(Self::model_to_auth_user))
    }

    /// Fetch a user, creating the row on first sight. Token-verified
    /// identities may predate any database record.
    pub async fn get_or_create(
        &self,
        id: Uuid,
        username: &str,
        avatar_url: Option<String>,
    ) -> Result<AuthUser> {
        if let Some(existing) = Users::find_by_id(id).one(&self.db).await? {
            return Ok(Self::model_to_auth_user(existing));
        }

        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();
        let user_model = users::ActiveModel {
            id: sea_orm::ActiveValue::Set(id),
            username: sea_orm::ActiveValue::Set(username.to_string()),
            avatar_url: sea_orm::ActiveValue::Set(avatar_url),
            is_guest: sea_orm::ActiveValue::Set(false),
            elo_rating: sea_orm::ActiveValue::Set(1000),
            games_played: sea_orm::ActiveValue::Set(0),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
        };

        Users::insert(user_model).exec(&self.db).await?;

        let created = Users::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))?;

        Ok(Self::model_to_auth_user(created))
    }

    /// Current rating and games-played counter for ELO computation.
    pub async fn rating(&self, id: Uuid) -> Result<Option<(i32, i32)>> {
        let user = Users::find_by_id(id).one(&self.db).await?;
        Ok(user.map(|u| (u.elo_rating, u.games_played)))
    }

    /// Apply a post-match rating, bumping the games-played counter.
    pub async fn update_rating(&self, id: Uuid, new_elo: i32) -> Result<()> {
        let user = Users::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found"))?;

        let updated = users::ActiveModel {
            id: sea_orm::ActiveValue::Unchanged(user.id),
            username: sea_orm::ActiveValue::Unchanged(user.username),
            avatar_url: sea_orm::ActiveValue::Unchanged(user.avatar_url),
            is_guest: sea_orm::ActiveValue::Unchanged(user.is_guest),
            elo_rating: sea_orm::ActiveValue::Set(new_elo),
            games_played: sea_orm::ActiveValue::Set(user.games_played + 1),
            created_at: sea_orm::ActiveValue::Unchanged(user.created_at),
            updated_at: sea_orm::ActiveValue::Set(chrono::Utc::now().into()),
        };

        Users::update(updated).exec(&self.db).await?;
        Ok(())
    }

    /// Rating leaderboard over registered users who have played.
    pub async fn get_leaderboard(&self, limit: u64) -> Result<Vec<LeaderboardEntry>> {
        let users = Users::find()
            .filter(users::Column::IsGuest.eq(false))
            .filter(users::Column::GamesPlayed.gt(0))
            .order_by_desc(users::Column::EloRating)
            .limit(limit)
            .all(&self.db)
            .await?;

        let leaderboard = users
            .into_iter()
            .enumerate()
            .map(|(index, model)| LeaderboardEntry {
                user_id: model.id,
                username: model.username,
                avatar_url: model.avatar_url,
                elo_rating: model.elo_rating,
                games_played: model.games_played,
                rank: (index + 1) as u32,
            })
            .collect();

        Ok(leaderboard)
    }

    pub async fn get_user_rank(&self, user_id: Uuid) -> Result<Option<u32>> {
        let user = Users::find_by_id(user_id).one(&self.db).await?;

        if let Some(user_model) = user {
            let users_above = Users::find()
                .filter(users::Column::IsGuest.eq(false))
                .filter(users::Column::EloRating.gt(user_model.elo_rating))
                .count(&self.db)
                .await?;

            Ok(Some(users_above as u32 + 1))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};
    use uuid::Uuid;

    async fn setup_test_db() -> UserRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        UserRepository::new(db)
    }

    #[tokio::test]
    async fn test_get_or_create_and_find() {
        let repo = setup_test_db().await;
        let user_id = Uuid::new_v4();

        let created = repo.get_or_create(user_id, "alice", None).await.unwrap();
        assert_eq!(created.username, "alice");
        assert_eq!(created.elo, 1000);
        assert_eq!(created.games_played, 0);
        assert!(!created.is_guest);

        // Second call returns the existing row
        let again = repo.get_or_create(user_id, "renamed", None).await.unwrap();
        assert_eq!(again.username, "alice");

        let found = repo.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(found.user_id, Some(user_id));
    }

    #[tokio::test]
    async fn test_update_rating_bumps_games_played() {
        let repo = setup_test_db().await;
        let user_id = Uuid::new_v4();
        repo.get_or_create(user_id, "bob", None).await.unwrap();

        repo.update_rating(user_id, 1016).await.unwrap();
        assert_eq!(repo.rating(user_id).await.unwrap(), Some((1016, 1)));

        repo.update_rating(user_id, 1000).await.unwrap();
        assert_eq!(repo.rating(user_id).await.unwrap(), Some((1000, 2)));
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_rating_and_skips_unplayed() {
        let repo = setup_test_db().await;

        let strong = Uuid::new_v4();
        let weak = Uuid::new_v4();
        let unplayed = Uuid::new_v4();

        repo.get_or_create(strong, "strong", None).await.unwrap();
        repo.get_or_create(weak, "weak", None).await.unwrap();
        repo.get_or_create(unplayed, "unplayed", None).await.unwrap();

        repo.update_rating(strong, 1200).await.unwrap();
        repo.update_rating(weak, 950).await.unwrap();

        let leaderboard = repo.get_leaderboard(10).await.unwrap();
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0].username, "strong");
        assert_eq!(leaderboard[0].rank, 1);
        assert_eq!(leaderboard[1].username, "weak");
        assert_eq!(leaderboard[1].rank, 2);
    }

    #[tokio::test]
    async fn test_user_rank() {
        let repo = setup_test_db().await;

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        repo.get_or_create(first, "first", None).await.unwrap();
        repo.get_or_create(second, "second", None).await.unwrap();
        repo.update_rating(first, 1300).await.unwrap();
        repo.update_rating(second, 1100).await.unwrap();

        assert_eq!(repo.get_user_rank(first).await.unwrap(), Some(1));
        assert_eq!(repo.get_user_rank(second).await.unwrap(), Some(2));
        assert_eq!(repo.get_user_rank(Uuid::new_v4()).await.unwrap(), None);
    }
}
