//! SM-2 spaced repetition, adapted for map/timeline recall.
//!
//! Recall quality is derived from how close the guess landed in space
//! and time, then fed through the standard SuperMemo-2 update. Event
//! selection is deliberately probabilistic (roughly 70% overdue / 20%
//! new / 10% preview) so sessions stay varied; the random source is
//! injected so the tier logic is testable.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use game_types::{Event, Learnedness, LearnednessLevel};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const DEFAULT_MAX_NEW_PER_SESSION: usize = 10;

/// Quality at or above which a recall counts as successful.
pub const PASSING_QUALITY: u8 = 3;

/// The SM-2 scheduling variables for one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewState {
    pub ease_factor: f64,
    pub interval_days: i32,
    pub repetitions: i32,
}

impl Default for ReviewState {
    fn default() -> Self {
        ReviewState {
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            repetitions: 0,
        }
    }
}

/// A user's full persisted progress record for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventProgress {
    pub event_name: String,
    pub ease_factor: f64,
    pub interval_days: i32,
    pub repetitions: i32,
    pub last_quality: i32,
    pub next_review: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
    pub total_attempts: i32,
    pub successful_attempts: i32,
}

impl EventProgress {
    pub fn review_state(&self) -> ReviewState {
        ReviewState {
            ease_factor: self.ease_factor,
            interval_days: self.interval_days,
            repetitions: self.repetitions,
        }
    }
}

/// Result of one SM-2 update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewUpdate {
    pub ease_factor: f64,
    pub interval_days: i32,
    pub repetitions: i32,
    pub next_review: DateTime<Utc>,
}

/// Recall quality 0..=5 from year and distance error.
///
/// The bucket boundaries are deliberately coarse: years compare with
/// less-or-equal, kilometers with strict less-than.
pub fn quality(year_error: i32, distance_km: f64) -> u8 {
    let year_error = year_error.abs();
    let year_score = if year_error == 0 {
        2.5
    } else if year_error <= 10 {
        2.0
    } else if year_error <= 20 {
        1.0
    } else {
        0.0
    };

    let distance_score = if distance_km < 20.0 {
        2.5
    } else if distance_km < 35.0 {
        1.5
    } else if distance_km < 50.0 {
        0.5
    } else {
        0.0
    };

    (year_score + distance_score).round() as u8
}

/// Standard SM-2 update. A failing quality (< 3) resets repetitions and
/// the interval; a passing one grows the interval 1 → 6 → round(i·EF),
/// using the ease factor from before this update. The ease factor
/// itself is then adjusted and floored at 1.3.
pub fn next_review(current: Option<&ReviewState>, quality: u8, now: DateTime<Utc>) -> ReviewUpdate {
    let state = current.copied().unwrap_or_default();
    let mut ease_factor = state.ease_factor;
    let mut interval_days = state.interval_days;
    let mut repetitions = state.repetitions;

    if quality < PASSING_QUALITY {
        repetitions = 0;
        interval_days = 1;
    } else {
        interval_days = match repetitions {
            0 => 1,
            1 => 6,
            _ => (interval_days as f64 * ease_factor).round() as i32,
        };
        repetitions += 1;
    }

    let miss = (5 - quality as i32) as f64;
    ease_factor += 0.1 - miss * (0.08 + miss * 0.02);
    ease_factor = ease_factor.max(MIN_EASE_FACTOR);
    ease_factor = (ease_factor * 100.0).round() / 100.0;

    ReviewUpdate {
        ease_factor,
        interval_days,
        repetitions,
        next_review: now + Duration::days(interval_days as i64),
    }
}

/// Derived learning progress for one event, for UI display only.
pub fn learnedness(progress: Option<&EventProgress>) -> Learnedness {
    let Some(progress) = progress else {
        return Learnedness {
            level: LearnednessLevel::New,
            percentage: 0,
        };
    };

    if progress.repetitions == 0 {
        return Learnedness {
            level: LearnednessLevel::New,
            percentage: 0,
        };
    }

    let ease_factor = progress.ease_factor;
    let repetitions = progress.repetitions;

    if ease_factor >= DEFAULT_EASE_FACTOR && repetitions >= 3 {
        // 66-100%, scaling with reps beyond the third (capped at +7)
        // and ease above 2.5 (capped at +0.5)
        let extra_reps = (repetitions - 3).min(7) as f64;
        let ease_bonus = ((ease_factor - 2.5) / 0.5).min(1.0);
        let percentage = 66.0 + (extra_reps / 7.0) * 25.0 + ease_bonus * 9.0;
        return Learnedness {
            level: LearnednessLevel::Mastered,
            percentage: percentage.round().min(100.0) as u8,
        };
    }

    // 33-66%, blending repetition progress toward 3 with ease progress
    // from the 1.3 floor toward 2.5, equally weighted
    let rep_progress = (repetitions as f64 / 3.0).min(1.0);
    let ease_progress = ((ease_factor - MIN_EASE_FACTOR) / 1.2).max(0.0);
    let percentage = 33.0 + (rep_progress * 0.5 + ease_progress * 0.5) * 33.0;
    Learnedness {
        level: LearnednessLevel::Learning,
        percentage: percentage.round().min(100.0) as u8,
    }
}

/// Mean learnedness percentage over every event in a category. Events
/// without progress contribute 0%.
pub fn category_learnedness(events: &[Event], records: &[EventProgress]) -> u8 {
    if events.is_empty() {
        return 0;
    }

    let by_name: HashMap<&str, &EventProgress> = records
        .iter()
        .map(|r| (r.event_name.as_str(), r))
        .collect();

    let total: u32 = events
        .iter()
        .map(|e| learnedness(by_name.get(e.name.as_str()).copied()).percentage as u32)
        .sum();

    ((total as f64) / (events.len() as f64)).round() as u8
}

/// Injected randomness for event selection, so tests can pin the draw.
pub trait RandomSource {
    /// Uniform draw in [0, 1).
    fn next_f64(&mut self) -> f64;
    /// Uniform index in 0..len. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Adapter over any `rand::Rng`.
pub struct RngSource<R: Rng>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_f64(&mut self) -> f64 {
        self.0.random()
    }

    fn pick(&mut self, len: usize) -> usize {
        self.0.random_range(0..len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSelection<'a> {
    pub event: &'a Event,
    pub progress: Option<&'a EventProgress>,
}

/// Pick the next event for a learning session.
///
/// Events partition into overdue (due now, or seen-but-never-passed),
/// new (never attempted, gated by a per-day introduction cap), and
/// not-yet-due. Roughly 70% of draws take the most overdue item, 20% a
/// random new one, and the rest fall back overdue → new → soonest-due
/// preview → uniformly random. Repeats across calls are allowed.
pub fn select_next_event<'a>(
    events: &'a [Event],
    records: &'a [EventProgress],
    max_new_per_session: usize,
    now: DateTime<Utc>,
    rng: &mut dyn RandomSource,
) -> Option<EventSelection<'a>> {
    if events.is_empty() {
        return None;
    }

    let by_name: HashMap<&str, &EventProgress> = records
        .iter()
        .map(|r| (r.event_name.as_str(), r))
        .collect();

    // Approximate "new cards introduced today" as records on their
    // first successful repetition last reviewed today.
    let new_cards_today = records
        .iter()
        .filter(|r| r.repetitions == 1 && r.last_review.date_naive() == now.date_naive())
        .count();

    let mut overdue: Vec<(EventSelection<'a>, f64)> = Vec::new();
    let mut fresh: Vec<EventSelection<'a>> = Vec::new();
    let mut not_due: Vec<(EventSelection<'a>, f64)> = Vec::new();

    for event in events {
        match by_name.get(event.name.as_str()).copied() {
            None => {
                if new_cards_today < max_new_per_session {
                    fresh.push(EventSelection {
                        event,
                        progress: None,
                    });
                }
            }
            Some(progress) if progress.repetitions == 0 => {
                // Seen but never passed: treat as barely overdue
                overdue.push((
                    EventSelection {
                        event,
                        progress: Some(progress),
                    },
                    1.0,
                ));
            }
            Some(progress) => {
                let selection = EventSelection {
                    event,
                    progress: Some(progress),
                };
                let days = (now - progress.next_review).num_seconds() as f64 / 86_400.0;
                if days >= 0.0 {
                    overdue.push((selection, days));
                } else {
                    not_due.push((selection, -days));
                }
            }
        }
    }

    // Most overdue first; soonest due first
    overdue.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    not_due.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let draw = rng.next_f64();

    if !overdue.is_empty() && (draw < 0.7 || fresh.is_empty()) {
        return Some(overdue[0].0);
    }

    if !fresh.is_empty() && draw < 0.9 {
        return Some(fresh[rng.pick(fresh.len())]);
    }

    if !overdue.is_empty() {
        return Some(overdue[0].0);
    }

    if !fresh.is_empty() {
        return Some(fresh[rng.pick(fresh.len())]);
    }

    if !not_due.is_empty() {
        return Some(not_due[0].0);
    }

    let idx = rng.pick(events.len());
    Some(EventSelection {
        event: &events[idx],
        progress: by_name.get(events[idx].name.as_str()).copied(),
    })
}
