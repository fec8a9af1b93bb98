use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{prelude::*, user_event_progress};
use game_core::{EventProgress, PASSING_QUALITY, ReviewUpdate};

pub struct LearningRepository {
    db: DatabaseConnection,
}

impl LearningRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_progress(model: user_event_progress::Model) -> EventProgress {
        EventProgress {
            event_name: model.event_name,
            ease_factor: model.ease_factor,
            interval_days: model.interval_days,
            repetitions: model.repetitions,
            last_quality: model.last_quality,
            next_review: model.next_review.with_timezone(&Utc),
            last_review: model.last_review.with_timezone(&Utc),
            total_attempts: model.total_attempts,
            successful_attempts: model.successful_attempts,
        }
    }

    /// Every progress record a user has in one category.
    pub async fn get_progress(
        &self,
        user_id: Uuid,
        category_key: &str,
    ) -> Result<Vec<EventProgress>> {
        let records = UserEventProgress::find()
            .filter(user_event_progress::Column::UserId.eq(user_id))
            .filter(user_event_progress::Column::CategoryKey.eq(category_key))
            .all(&self.db)
            .await?;

        Ok(records.into_iter().map(Self::model_to_progress).collect())
    }

    /// Record one learning attempt, creating or updating the progress
    /// row keyed by (user, category, event). Attempt counters
    /// accumulate; a quality at or above the passing threshold counts
    /// as successful.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_progress(
        &self,
        user_id: Uuid,
        category_key: &str,
        event_name: &str,
        quality: u8,
        year_error: i32,
        distance_km: f64,
        review: &ReviewUpdate,
    ) -> Result<EventProgress> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let successful = if quality >= PASSING_QUALITY { 1 } else { 0 };

        let existing = UserEventProgress::find()
            .filter(user_event_progress::Column::UserId.eq(user_id))
            .filter(user_event_progress::Column::CategoryKey.eq(category_key))
            .filter(user_event_progress::Column::EventName.eq(event_name))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(record) => {
                let mut updated: user_event_progress::ActiveModel = record.clone().into();
                updated.ease_factor = ActiveValue::Set(review.ease_factor);
                updated.interval_days = ActiveValue::Set(review.interval_days);
                updated.repetitions = ActiveValue::Set(review.repetitions);
                updated.last_quality = ActiveValue::Set(quality as i32);
                updated.last_year_error = ActiveValue::Set(Some(year_error));
                updated.last_distance_km = ActiveValue::Set(Some(distance_km));
                updated.next_review = ActiveValue::Set(review.next_review.into());
                updated.last_review = ActiveValue::Set(now);
                updated.total_attempts = ActiveValue::Set(record.total_attempts + 1);
                updated.successful_attempts =
                    ActiveValue::Set(record.successful_attempts + successful);
                updated.updated_at = ActiveValue::Set(now);

                UserEventProgress::update(updated).exec(&self.db).await?
            }
            None => {
                let record = user_event_progress::ActiveModel {
                    id: ActiveValue::NotSet,
                    user_id: ActiveValue::Set(user_id),
                    category_key: ActiveValue::Set(category_key.to_string()),
                    event_name: ActiveValue::Set(event_name.to_string()),
                    ease_factor: ActiveValue::Set(review.ease_factor),
                    interval_days: ActiveValue::Set(review.interval_days),
                    repetitions: ActiveValue::Set(review.repetitions),
                    last_quality: ActiveValue::Set(quality as i32),
                    last_year_error: ActiveValue::Set(Some(year_error)),
                    last_distance_km: ActiveValue::Set(Some(distance_km)),
                    next_review: ActiveValue::Set(review.next_review.into()),
                    last_review: ActiveValue::Set(now),
                    total_attempts: ActiveValue::Set(1),
                    successful_attempts: ActiveValue::Set(successful),
                    updated_at: ActiveValue::Set(now),
                };

                let result = UserEventProgress::insert(record).exec(&self.db).await?;
                UserEventProgress::find_by_id(result.last_insert_id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("Failed to retrieve progress record"))?
            }
        };

        Ok(Self::model_to_progress(model))
    }

    /// Count of records due for review now.
    pub async fn due_count(&self, user_id: Uuid, category_key: &str) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let count = UserEventProgress::find()
            .filter(user_event_progress::Column::UserId.eq(user_id))
            .filter(user_event_progress::Column::CategoryKey.eq(category_key))
            .filter(user_event_progress::Column::NextReview.lte(now))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use chrono::Duration;
    use game_core::next_review;
    use migration::{Migrator, MigratorTrait};

    async fn setup_test_db() -> LearningRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        LearningRepository::new(db)
    }

    #[tokio::test]
    async fn test_first_attempt_creates_record() {
        let repo = setup_test_db().await;
        let user = Uuid::new_v4();
        let review = next_review(None, 5, Utc::now());

        let progress = repo
            .upsert_progress(user, "battles", "The Battle of Waterloo", 5, 0, 5.0, &review)
            .await
            .unwrap();

        assert_eq!(progress.repetitions, 1);
        assert_eq!(progress.interval_days, 1);
        assert_eq!(progress.total_attempts, 1);
        assert_eq!(progress.successful_attempts, 1);
        assert!(progress.ease_factor > 2.5);
    }

    #[tokio::test]
    async fn test_repeated_attempts_accumulate_counters() {
        let repo = setup_test_db().await;
        let user = Uuid::new_v4();
        let now = Utc::now();

        let first = next_review(None, 5, now);
        let stored = repo
            .upsert_progress(user, "battles", "The Battle of Tours", 5, 0, 3.0, &first)
            .await
            .unwrap();

        // A failing attempt resets scheduling but still counts
        let second = next_review(Some(&stored.review_state()), 1, now);
        let stored = repo
            .upsert_progress(user, "battles", "The Battle of Tours", 1, 300, 900.0, &second)
            .await
            .unwrap();

        assert_eq!(stored.repetitions, 0);
        assert_eq!(stored.interval_days, 1);
        assert_eq!(stored.total_attempts, 2);
        assert_eq!(stored.successful_attempts, 1);
        assert_eq!(stored.last_quality, 1);

        // Still a single row for the (user, category, event) key
        let all = repo.get_progress(user, "battles").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_scoped_by_category() {
        let repo = setup_test_db().await;
        let user = Uuid::new_v4();
        let review = next_review(None, 4, Utc::now());

        repo.upsert_progress(user, "battles", "The Battle of Midway", 4, 2, 10.0, &review)
            .await
            .unwrap();

        assert_eq!(repo.get_progress(user, "battles").await.unwrap().len(), 1);
        assert!(repo.get_progress(user, "world").await.unwrap().is_empty());
        assert!(
            repo.get_progress(Uuid::new_v4(), "battles")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_due_count() {
        let repo = setup_test_db().await;
        let user = Uuid::new_v4();
        let now = Utc::now();

        // next_review lands tomorrow, so nothing is due yet
        let review = next_review(None, 5, now);
        repo.upsert_progress(user, "battles", "The Siege of Constantinople", 5, 0, 1.0, &review)
            .await
            .unwrap();
        assert_eq!(repo.due_count(user, "battles").await.unwrap(), 0);

        // Backdate the schedule to make it due
        let overdue = ReviewUpdate {
            ease_factor: 2.5,
            interval_days: 1,
            repetitions: 1,
            next_review: now - Duration::days(2),
        };
        repo.upsert_progress(user, "battles", "The Siege of Constantinople", 2, 50, 80.0, &overdue)
            .await
            .unwrap();
        assert_eq!(repo.due_count(user, "battles").await.unwrap(), 1);
    }
}
