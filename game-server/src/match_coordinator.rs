//! Per-match session state and the round lifecycle.
//!
//! A match walks Waiting → Playing, then loops prepare → ready-sync →
//! answers → results for ten rounds. Every "all participants signaled"
//! gate is re-checked after each individual signal; with a single
//! practice participant the gates pass trivially.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::MatchStore;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_core::{CategoryStore, TIMEOUT_PENALTY, distance_km, match_elo_changes, round_score};
use game_persistence::repositories::{NewRoundRecord, RoundStats};
use game_types::{
    Answer, AuthUser, Event, FinalScore, GameError, GuessSummary, MatchEndReason,
    MatchParticipant, MatchStatus, PlayerRoundResult, ServerMessage,
};

pub const ROUNDS_PER_MATCH: u32 = 10;

#[derive(Debug, Clone)]
pub struct MatchPlayer {
    pub connection_id: ConnectionId,
    pub local_id: String,
    pub display_name: String,
    pub user_id: Option<Uuid>,
    pub is_guest: bool,
    pub elo: i32,
    pub games_played: i32,
    pub score: i32,
    pub answers: Vec<Option<Answer>>,
    pub ready_for_round: bool,
    pub ready_for_next: bool,
}

impl MatchPlayer {
    fn new(index: usize, connection_id: ConnectionId, identity: &AuthUser) -> Self {
        Self {
            connection_id,
            local_id: format!("player_{}", index + 1),
            display_name: identity.username.clone(),
            user_id: identity.user_id,
            is_guest: identity.is_guest,
            elo: identity.elo,
            games_played: identity.games_played,
            score: 0,
            answers: vec![None; ROUNDS_PER_MATCH as usize],
            ready_for_round: false,
            ready_for_next: false,
        }
    }

    fn answer_for(&self, round: u32) -> Option<&Answer> {
        self.answers
            .get(round as usize - 1)
            .and_then(|a| a.as_ref())
    }

    fn to_participant(&self) -> MatchParticipant {
        MatchParticipant {
            player_id: self.local_id.clone(),
            display_name: self.display_name.clone(),
            elo: self.elo,
            is_guest: self.is_guest,
        }
    }
}

#[derive(Debug)]
struct ActiveMatch {
    id: Uuid,
    category_key: String,
    players: Vec<MatchPlayer>,
    status: MatchStatus,
    current_round: u32,
    current_event: Option<Event>,
    round_started_at: Option<Instant>,
    is_ranked: bool,
    has_record: bool,
}

impl ActiveMatch {
    fn connection_ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.connection_id).collect()
    }

    fn player_mut(&mut self, connection_id: ConnectionId) -> Option<&mut MatchPlayer> {
        self.players
            .iter_mut()
            .find(|p| p.connection_id == connection_id)
    }

    fn all_ready_for_round(&self) -> bool {
        self.players.iter().all(|p| p.ready_for_round)
    }

    fn all_ready_for_next(&self) -> bool {
        self.players.iter().all(|p| p.ready_for_next)
    }

    fn all_answered(&self, round: u32) -> bool {
        self.players.iter().all(|p| p.answer_for(round).is_some())
    }
}

pub struct MatchCoordinator {
    matches: RwLock<HashMap<Uuid, ActiveMatch>>,
    connection_to_match: RwLock<HashMap<ConnectionId, Uuid>>,
    categories: Arc<CategoryStore>,
    connection_manager: Arc<ConnectionManager>,
    store: Arc<dyn MatchStore>,
    match_start_delay: Duration,
    round_intro_delay: Duration,
}

impl MatchCoordinator {
    pub fn new(
        categories: Arc<CategoryStore>,
        connection_manager: Arc<ConnectionManager>,
        store: Arc<dyn MatchStore>,
    ) -> Self {
        Self::new_with_config(
            categories,
            connection_manager,
            store,
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
    }

    pub fn new_with_config(
        categories: Arc<CategoryStore>,
        connection_manager: Arc<ConnectionManager>,
        store: Arc<dyn MatchStore>,
        match_start_delay: Duration,
        round_intro_delay: Duration,
    ) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            connection_to_match: RwLock::new(HashMap::new()),
            categories,
            connection_manager,
            store,
            match_start_delay,
            round_intro_delay,
        }
    }

    /// Create a match for one (practice) or two participants, announce
    /// it, and schedule the first round. Ranked play requires two
    /// registered users; their rating snapshot is taken here.
    pub async fn create_match(
        self: &Arc<Self>,
        category_key: &str,
        participants: Vec<(ConnectionId, AuthUser)>,
    ) -> Result<Uuid, GameError> {
        if participants.is_empty() || participants.len() > 2 {
            return Err(GameError::InvalidMatchSize {
                players: participants.len() as u32,
            });
        }
        if !self.categories.contains(category_key) {
            return Err(GameError::CategoryNotFound {
                key: category_key.to_string(),
            });
        }

        // A participant still mapped to an earlier match (e.g. practice
        // restarted mid-game) ends that match first
        for (connection_id, _) in &participants {
            let stale = {
                let mapping = self.connection_to_match.read().await;
                mapping.get(connection_id).copied()
            };
            if let Some(stale_id) = stale {
                self.finalize(stale_id, MatchEndReason::PlayerDisconnected)
                    .await;
            }
        }

        let is_ranked = participants.len() == 2
            && participants
                .iter()
                .all(|(_, identity)| !identity.is_guest && identity.user_id.is_some());

        let mut players: Vec<MatchPlayer> = participants
            .iter()
            .enumerate()
            .map(|(i, (conn, identity))| MatchPlayer::new(i, *conn, identity))
            .collect();

        if is_ranked {
            for player in &mut players {
                let user_id = player.user_id.expect("ranked players are registered");
                match self.store.load_rating(user_id).await {
                    Ok(Some((elo, games_played))) => {
                        player.elo = elo;
                        player.games_played = games_played;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to load rating for {}: {:?}", user_id, e);
                    }
                }
            }
        }

        let match_id = Uuid::new_v4();
        let mut has_record = false;
        if is_ranked {
            let result = self
                .store
                .create_game(
                    match_id,
                    category_key,
                    players[0].user_id.expect("ranked"),
                    players[1].user_id.expect("ranked"),
                    players[0].elo,
                    players[1].elo,
                    true,
                )
                .await;
            match result {
                Ok(()) => has_record = true,
                Err(e) => warn!("Failed to create game record for {}: {:?}", match_id, e),
            }
        }

        let participants_summary: Vec<MatchParticipant> =
            players.iter().map(|p| p.to_participant()).collect();
        let connection_ids: Vec<ConnectionId> =
            players.iter().map(|p| p.connection_id).collect();

        let active = ActiveMatch {
            id: match_id,
            category_key: category_key.to_string(),
            players,
            status: MatchStatus::Waiting,
            current_round: 0,
            current_event: None,
            round_started_at: None,
            is_ranked,
            has_record,
        };

        {
            let mut matches = self.matches.write().await;
            matches.insert(match_id, active);
        }
        {
            let mut mapping = self.connection_to_match.write().await;
            for conn in &connection_ids {
                mapping.insert(*conn, match_id);
            }
        }

        info!(
            "Created {} match {} in {} with {} players",
            if is_ranked { "ranked" } else { "unranked" },
            match_id,
            category_key,
            connection_ids.len()
        );

        self.connection_manager
            .send_to_many(
                &connection_ids,
                &ServerMessage::MatchFound {
                    match_id: match_id.to_string(),
                    category_key: category_key.to_string(),
                    players: participants_summary,
                    is_ranked,
                },
            )
            .await;

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.match_start_delay).await;
            coordinator.start_match(match_id).await;
        });

        Ok(match_id)
    }

    /// Waiting → Playing: zero scores, announce, then round 1 after the
    /// intro delay. A no-op if the match died while waiting.
    async fn start_match(&self, match_id: Uuid) {
        let connection_ids = {
            let mut matches = self.matches.write().await;
            let Some(game) = matches.get_mut(&match_id) else {
                return;
            };
            game.status = MatchStatus::Playing;
            game.current_round = 0;
            for player in &mut game.players {
                player.score = 0;
                player.answers = vec![None; ROUNDS_PER_MATCH as usize];
                player.ready_for_round = false;
                player.ready_for_next = false;
            }
            game.connection_ids()
        };

        self.connection_manager
            .send_to_many(&connection_ids, &ServerMessage::GameStarting)
            .await;

        tokio::time::sleep(self.round_intro_delay).await;
        self.begin_round(match_id).await;
    }

    /// Pick the next round's event uniformly at random (repeats across
    /// rounds are allowed) and ask both players to ready up.
    async fn begin_round(&self, match_id: Uuid) {
        let broadcast = {
            let mut matches = self.matches.write().await;
            let Some(game) = matches.get_mut(&match_id) else {
                return;
            };
            if game.status != MatchStatus::Playing {
                return;
            }

            let Some(category) = self.categories.get(&game.category_key) else {
                warn!("Category {} vanished for match {}", game.category_key, match_id);
                return;
            };

            game.current_round += 1;
            let idx = rand::rng().random_range(0..category.events.len());
            let event = category.events[idx].clone();
            game.current_event = Some(event.clone());
            game.round_started_at = None;
            for player in &mut game.players {
                player.ready_for_round = false;
            }

            (game.connection_ids(), game.current_round, event)
        };

        let (connection_ids, round, event) = broadcast;
        self.connection_manager
            .send_to_many(&connection_ids, &ServerMessage::PrepareRound { round, event })
            .await;
    }

    /// A player is ready for the prepared round. Once every participant
    /// has signaled, broadcast the synchronized start so both 30-second
    /// countdowns begin together.
    pub async fn handle_ready_for_round(&self, connection_id: ConnectionId) -> Result<(), GameError> {
        let match_id = self.match_id_for(connection_id).await?;

        let start = {
            let mut matches = self.matches.write().await;
            let game = matches.get_mut(&match_id).ok_or(GameError::MatchNotFound)?;
            if game.current_event.is_none() {
                return Err(GameError::NoActiveRound);
            }

            let player = game
                .player_mut(connection_id)
                .ok_or(GameError::PlayerNotInMatch)?;
            player.ready_for_round = true;

            if game.all_ready_for_round() && game.round_started_at.is_none() {
                game.round_started_at = Some(Instant::now());
                Some((game.connection_ids(), game.current_round))
            } else {
                None
            }
        };

        if let Some((connection_ids, round)) = start {
            self.connection_manager
                .send_to_many(&connection_ids, &ServerMessage::RoundStart { round })
                .await;
        }

        Ok(())
    }

    /// Record a player's answer for the current round, score it, and
    /// acknowledge privately. The first answer for a round index wins;
    /// repeats are rejected without touching state. When the last
    /// participant answers, results go out to everyone.
    pub async fn handle_submit_answer(
        &self,
        connection_id: ConnectionId,
        guess_lat: f64,
        guess_lng: f64,
        guess_year: i32,
        time_left: f64,
    ) -> Result<(), GameError> {
        let match_id = self.match_id_for(connection_id).await?;

        let (ack, completion) = {
            let mut matches = self.matches.write().await;
            let game = matches.get_mut(&match_id).ok_or(GameError::MatchNotFound)?;
            if game.status != MatchStatus::Playing || game.current_round == 0 {
                return Err(GameError::NoActiveRound);
            }
            let event = game
                .current_event
                .clone()
                .ok_or(GameError::NoActiveRound)?;
            let round = game.current_round;

            let player = game
                .player_mut(connection_id)
                .ok_or(GameError::PlayerNotInMatch)?;
            if player.answer_for(round).is_some() {
                return Err(GameError::AnswerAlreadySubmitted { round });
            }

            let distance = distance_km(guess_lat, guess_lng, event.lat, event.lng);
            let year_error = (guess_year - event.year).abs();
            let mut score = round_score(distance, year_error, time_left);
            if time_left <= 0.0 {
                score -= TIMEOUT_PENALTY;
            }

            player.answers[round as usize - 1] = Some(Answer {
                guess_lat,
                guess_lng,
                guess_year,
                time_left,
                round_score: score,
                distance_km: distance,
                year_error,
                submitted_at: Utc::now().to_rfc3339(),
            });
            player.score += score;

            let ack = (
                connection_id,
                ServerMessage::AnswerReceived {
                    round_score: score,
                    total_score: player.score,
                    distance_km: distance,
                    year_error,
                },
            );

            let completion = if game.all_answered(round) {
                let results: Vec<PlayerRoundResult> = game
                    .players
                    .iter()
                    .map(|p| {
                        let answer = p.answer_for(round).expect("all answered");
                        PlayerRoundResult {
                            player_id: p.local_id.clone(),
                            player_name: p.display_name.clone(),
                            total_score: p.score,
                            round_score: answer.round_score,
                            guess: GuessSummary {
                                lat: answer.guess_lat,
                                lng: answer.guess_lng,
                                year: answer.guess_year,
                            },
                            distance: answer.distance_km.round() as i64,
                            year_error: answer.year_error,
                        }
                    })
                    .collect();

                let archive = self.round_record(game, round, &event);
                Some((game.connection_ids(), results, event.clone(), archive))
            } else {
                None
            };

            (ack, completion)
        };

        let (submitter, ack_message) = ack;
        let _ = self
            .connection_manager
            .send_to_connection(submitter, ack_message)
            .await;

        if let Some((connection_ids, results, correct_answer, archive)) = completion {
            self.connection_manager
                .send_to_many(
                    &connection_ids,
                    &ServerMessage::RoundResults {
                        results,
                        correct_answer,
                    },
                )
                .await;

            if let Some(record) = archive {
                if let Err(e) = self.store.save_round(match_id, record).await {
                    warn!("Failed to archive round for {}: {:?}", match_id, e);
                }
            }
        }

        Ok(())
    }

    /// Round archival row for ranked two-player matches.
    fn round_record(
        &self,
        game: &ActiveMatch,
        round: u32,
        event: &Event,
    ) -> Option<NewRoundRecord> {
        if !game.is_ranked || !game.has_record || game.players.len() != 2 {
            return None;
        }
        let a1 = game.players[0].answer_for(round)?;
        let a2 = game.players[1].answer_for(round)?;

        Some(NewRoundRecord {
            round_number: round as i32,
            event_name: event.name.clone(),
            event_lat: event.lat,
            event_lng: event.lng,
            event_year: event.year,
            player1_guess_lat: a1.guess_lat,
            player1_guess_lng: a1.guess_lng,
            player1_guess_year: a1.guess_year,
            player1_distance_km: a1.distance_km,
            player1_year_error: a1.year_error,
            player1_time_left: a1.time_left,
            player1_score: a1.round_score,
            player2_guess_lat: a2.guess_lat,
            player2_guess_lng: a2.guess_lng,
            player2_guess_year: a2.guess_year,
            player2_distance_km: a2.distance_km,
            player2_year_error: a2.year_error,
            player2_time_left: a2.time_left,
            player2_score: a2.round_score,
        })
    }

    /// A player wants the next round. When everyone has signaled, the
    /// tenth completed round ends the match; otherwise the next round
    /// is prepared.
    pub async fn handle_ready_next_round(
        &self,
        connection_id: ConnectionId,
    ) -> Result<(), GameError> {
        let match_id = self.match_id_for(connection_id).await?;

        enum Advance {
            Wait,
            NextRound,
            GameOver,
        }

        let advance = {
            let mut matches = self.matches.write().await;
            let game = matches.get_mut(&match_id).ok_or(GameError::MatchNotFound)?;
            if game.status != MatchStatus::Playing {
                return Err(GameError::NoActiveRound);
            }

            let player = game
                .player_mut(connection_id)
                .ok_or(GameError::PlayerNotInMatch)?;
            player.ready_for_next = true;

            if !game.all_ready_for_next() {
                Advance::Wait
            } else if game.current_round >= ROUNDS_PER_MATCH {
                Advance::GameOver
            } else {
                for player in &mut game.players {
                    player.ready_for_next = false;
                }
                Advance::NextRound
            }
        };

        match advance {
            Advance::Wait => {}
            Advance::NextRound => self.begin_round(match_id).await,
            Advance::GameOver => self.finalize(match_id, MatchEndReason::Completed).await,
        }

        Ok(())
    }

    /// A participant's connection closed. Any live match it belonged to
    /// ends immediately through the normal game-over path with the
    /// scores accrued so far.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        let match_id = {
            let mapping = self.connection_to_match.read().await;
            mapping.get(&connection_id).copied()
        };

        if let Some(match_id) = match_id {
            info!(
                "Connection {} dropped mid-match, ending {}",
                connection_id, match_id
            );
            self.finalize(match_id, MatchEndReason::PlayerDisconnected).await;
        }
    }

    /// Tear the match down: rank players, apply ELO for ranked play,
    /// broadcast final scores with the termination reason, and persist
    /// what the store will take. Persistence failures only log; the
    /// broadcast has already gone out by then.
    async fn finalize(&self, match_id: Uuid, reason: MatchEndReason) {
        let Some(game) = ({
            let mut matches = self.matches.write().await;
            matches.remove(&match_id)
        }) else {
            return;
        };

        {
            let mut mapping = self.connection_to_match.write().await;
            for player in &game.players {
                mapping.remove(&player.connection_id);
            }
        }

        let connection_ids = game.connection_ids();
        let ranked_pair = game.is_ranked && game.players.len() == 2;

        let elo_updates = if ranked_pair {
            let (p1, p2) = (&game.players[0], &game.players[1]);
            Some(match_elo_changes(
                p1.elo,
                p2.elo,
                p1.score,
                p2.score,
                p1.games_played,
                p2.games_played,
            ))
        } else {
            None
        };

        let mut final_scores: Vec<FinalScore> = game
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let update = elo_updates
                    .as_ref()
                    .map(|(u1, u2)| if i == 0 { u1 } else { u2 });
                FinalScore {
                    player_id: p.local_id.clone(),
                    player_name: p.display_name.clone(),
                    total_score: p.score,
                    elo_change: update.map(|u| u.change),
                    new_elo: update.map(|u| u.new_rating),
                }
            })
            .collect();
        final_scores.sort_by(|a, b| b.total_score.cmp(&a.total_score));

        info!(
            "Match {} over ({:?}): {}",
            game.id,
            reason,
            final_scores
                .iter()
                .map(|s| format!("{}: {}", s.player_name, s.total_score))
                .collect::<Vec<_>>()
                .join(", ")
        );

        self.connection_manager
            .send_to_many(
                &connection_ids,
                &ServerMessage::GameOver {
                    final_scores,
                    reason,
                },
            )
            .await;

        if let (Some((update1, update2)), true) = (elo_updates, ranked_pair) {
            self.persist_ranked_result(&game, reason, update1, update2)
                .await;
        }
    }

    async fn persist_ranked_result(
        &self,
        game: &ActiveMatch,
        reason: MatchEndReason,
        update1: game_core::EloUpdate,
        update2: game_core::EloUpdate,
    ) {
        let (p1, p2) = (&game.players[0], &game.players[1]);
        let (u1, u2) = (
            p1.user_id.expect("ranked players are registered"),
            p2.user_id.expect("ranked players are registered"),
        );

        if let Err(e) = self.store.update_rating(u1, update1.new_rating).await {
            warn!("Failed to persist rating for {}: {:?}", u1, e);
        }
        if let Err(e) = self.store.update_rating(u2, update2.new_rating).await {
            warn!("Failed to persist rating for {}: {:?}", u2, e);
        }

        if game.has_record {
            let winner_id = if p1.score > p2.score {
                Some(u1)
            } else if p2.score > p1.score {
                Some(u2)
            } else {
                None
            };
            let end_reason = match reason {
                MatchEndReason::Completed => "completed",
                MatchEndReason::PlayerDisconnected => "player_disconnected",
            };
            if let Err(e) = self
                .store
                .complete_game(
                    game.id,
                    p1.score,
                    p2.score,
                    winner_id,
                    Some(update1.new_rating),
                    Some(update2.new_rating),
                    end_reason,
                )
                .await
            {
                warn!("Failed to complete game record {}: {:?}", game.id, e);
            }
        }

        for (player, user_id) in [(p1, u1), (p2, u2)] {
            let answers: Vec<&Answer> =
                player.answers.iter().filter_map(|a| a.as_ref()).collect();
            let stats = RoundStats {
                total_score: answers.iter().map(|a| a.round_score).sum(),
                total_distance_error: answers.iter().map(|a| a.distance_km).sum(),
                total_year_error: answers.iter().map(|a| a.year_error).sum(),
                round_count: answers.len() as i32,
                best_round_score: answers.iter().map(|a| a.round_score).max().unwrap_or(0),
            };
            let opponent = if player.local_id == p1.local_id { p2 } else { p1 };
            let won = player.score > opponent.score;

            if let Err(e) = self
                .store
                .update_stats(user_id, player.score, won, stats)
                .await
            {
                warn!("Failed to update stats for {}: {:?}", user_id, e);
            }
        }
    }

    async fn match_id_for(&self, connection_id: ConnectionId) -> Result<Uuid, GameError> {
        let mapping = self.connection_to_match.read().await;
        mapping
            .get(&connection_id)
            .copied()
            .ok_or(GameError::MatchNotFound)
    }

    pub async fn is_in_match(&self, connection_id: ConnectionId) -> bool {
        let mapping = self.connection_to_match.read().await;
        mapping.contains_key(&connection_id)
    }

    pub async fn active_match_count(&self) -> usize {
        let matches = self.matches.read().await;
        matches.len()
    }
}
