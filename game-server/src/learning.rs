//! Spaced-repetition learning sessions, one per connection.
//!
//! The correct location and year are withheld from the "next event"
//! message and revealed only in the submit response, so a client cannot
//! look the answer up before guessing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::LearningStore;
use crate::websocket::connection::ConnectionId;
use game_core::{
    CategoryStore, DEFAULT_MAX_NEW_PER_SESSION, EventProgress, RngSource, category_learnedness,
    distance_km, learnedness, next_review, quality, select_next_event,
};
use game_types::{
    AuthUser, Category, CategorySummary, Event, GameError, LearningStats, ProgressSummary,
    ServerMessage,
};

#[derive(Debug, Clone)]
pub struct LearningSession {
    pub category_key: String,
    pub user_id: Uuid,
    pub current_event: Option<Event>,
}

pub struct LearningManager {
    sessions: RwLock<HashMap<ConnectionId, LearningSession>>,
    categories: Arc<CategoryStore>,
    store: Arc<dyn LearningStore>,
}

impl LearningManager {
    pub fn new(categories: Arc<CategoryStore>, store: Arc<dyn LearningStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            categories,
            store,
        }
    }

    /// Start a learning session. Progress persistence needs a durable
    /// identity, so guests are rejected outright.
    pub async fn start(
        &self,
        connection_id: ConnectionId,
        category_key: &str,
        identity: &AuthUser,
    ) -> Result<ServerMessage, GameError> {
        let user_id = match identity.user_id {
            Some(user_id) if !identity.is_guest => user_id,
            _ => return Err(GameError::IdentityRequired),
        };

        let category = self
            .categories
            .get(category_key)
            .ok_or_else(|| GameError::CategoryNotFound {
                key: category_key.to_string(),
            })?;

        let progress = self
            .store
            .get_progress(user_id, category_key)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to load progress for {}: {:?}", user_id, e);
                Vec::new()
            });
        let stats = compute_stats(category, &progress);

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                connection_id,
                LearningSession {
                    category_key: category_key.to_string(),
                    user_id,
                    current_event: None,
                },
            );
        }

        info!(
            "Learning session started for {} in {}",
            identity.username, category_key
        );

        Ok(ServerMessage::LearningStarted {
            category: CategorySummary::from(category),
            stats,
        })
    }

    /// Pick the next event via the spaced-repetition scheduler. Only
    /// the event name leaves the server here.
    pub async fn next_event(&self, connection_id: ConnectionId) -> Result<ServerMessage, GameError> {
        let (category_key, user_id) = self.session_info(connection_id).await?;

        let category = self
            .categories
            .get(&category_key)
            .ok_or_else(|| GameError::CategoryNotFound {
                key: category_key.clone(),
            })?;

        let progress = self
            .store
            .get_progress(user_id, &category_key)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to refresh progress for {}: {:?}", user_id, e);
                Vec::new()
            });

        let mut rng = RngSource(rand::rng());
        let selection = select_next_event(
            &category.events,
            &progress,
            DEFAULT_MAX_NEW_PER_SESSION,
            Utc::now(),
            &mut rng,
        )
        .ok_or_else(|| GameError::CategoryNotFound {
            key: category_key.clone(),
        })?;

        let event = selection.event.clone();
        let event_progress = selection.progress;
        let message = ServerMessage::LearningEvent {
            event_name: event.name.clone(),
            progress: event_progress.map(progress_summary),
            learnedness: learnedness(event_progress),
        };

        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(&connection_id) {
                session.current_event = Some(event);
            }
        }

        Ok(message)
    }

    /// Score a guess against the withheld answer, fold it into the SM-2
    /// schedule, persist, and reveal the correct event. The session's
    /// current event is cleared either way, so a second submit without
    /// an intervening next-event request is rejected.
    pub async fn submit(
        &self,
        connection_id: ConnectionId,
        guess_lat: f64,
        guess_lng: f64,
        guess_year: i32,
    ) -> Result<ServerMessage, GameError> {
        let (category_key, user_id, event) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&connection_id)
                .ok_or(GameError::NoLearningSession)?;
            let event = session
                .current_event
                .take()
                .ok_or(GameError::NoCurrentEvent)?;
            (session.category_key.clone(), session.user_id, event)
        };

        let distance = distance_km(guess_lat, guess_lng, event.lat, event.lng);
        let year_error = (guess_year - event.year).abs();
        let recall_quality = quality(year_error, distance);

        let existing = self
            .store
            .get_progress(user_id, &category_key)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to load progress for {}: {:?}", user_id, e);
                Vec::new()
            });
        let current = existing
            .iter()
            .find(|p| p.event_name == event.name)
            .map(|p| p.review_state());

        let review = next_review(current.as_ref(), recall_quality, Utc::now());

        let updated = match self
            .store
            .upsert_progress(
                user_id,
                &category_key,
                &event.name,
                recall_quality,
                year_error,
                distance,
                &review,
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                // The write failed; answer from the computed schedule so
                // the session stays usable.
                warn!("Failed to persist progress for {}: {:?}", user_id, e);
                EventProgress {
                    event_name: event.name.clone(),
                    ease_factor: review.ease_factor,
                    interval_days: review.interval_days,
                    repetitions: review.repetitions,
                    last_quality: recall_quality as i32,
                    next_review: review.next_review,
                    last_review: Utc::now(),
                    total_attempts: 1,
                    successful_attempts: 0,
                }
            }
        };

        let category = self
            .categories
            .get(&category_key)
            .ok_or_else(|| GameError::CategoryNotFound {
                key: category_key.clone(),
            })?;
        let refreshed = self
            .store
            .get_progress(user_id, &category_key)
            .await
            .unwrap_or_else(|_| vec![updated.clone()]);
        let stats = compute_stats(category, &refreshed);

        Ok(ServerMessage::LearningResult {
            correct_answer: event,
            distance_km: distance,
            year_error,
            quality: recall_quality,
            learnedness: learnedness(Some(&updated)),
            next_review: review.next_review.to_rfc3339(),
            interval_days: review.interval_days,
            stats,
        })
    }

    pub async fn end_session(&self, connection_id: ConnectionId) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&connection_id).is_some() {
            info!("Learning session ended for {}", connection_id);
        }
    }

    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    async fn session_info(&self, connection_id: ConnectionId) -> Result<(String, Uuid), GameError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&connection_id)
            .ok_or(GameError::NoLearningSession)?;
        Ok((session.category_key.clone(), session.user_id))
    }
}

fn progress_summary(progress: &EventProgress) -> ProgressSummary {
    ProgressSummary {
        repetitions: progress.repetitions,
        interval_days: progress.interval_days,
        ease_factor: progress.ease_factor,
        next_review: Some(progress.next_review.to_rfc3339()),
        total_attempts: progress.total_attempts,
        successful_attempts: progress.successful_attempts,
    }
}

fn compute_stats(category: &Category, progress: &[EventProgress]) -> LearningStats {
    let now = Utc::now();
    let mastered = progress
        .iter()
        .filter(|p| p.repetitions >= 3 && p.ease_factor >= 2.5)
        .count() as u32;
    let due = progress.iter().filter(|p| p.next_review <= now).count() as u32;

    LearningStats {
        total_events: category.events.len() as u32,
        seen: progress.len() as u32,
        mastered,
        due,
        category_learnedness: category_learnedness(&category.events, progress),
    }
}
