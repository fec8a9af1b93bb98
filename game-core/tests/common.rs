use chrono::{DateTime, Duration, Utc};
use game_core::{EventProgress, RandomSource};
use game_types::Event;

/// Random source returning a fixed sequence of draws, so selection
/// tiers can be pinned exactly.
pub struct FixedSource {
    draws: Vec<f64>,
    picks: Vec<usize>,
}

impl FixedSource {
    pub fn new(draws: Vec<f64>, picks: Vec<usize>) -> Self {
        Self {
            draws: draws.into_iter().rev().collect(),
            picks: picks.into_iter().rev().collect(),
        }
    }

    /// A source that always produces the same draw and picks index 0.
    pub fn constant(draw: f64) -> Self {
        Self {
            draws: vec![draw],
            picks: vec![],
        }
    }
}

impl RandomSource for FixedSource {
    fn next_f64(&mut self) -> f64 {
        self.draws.pop().unwrap_or(0.0)
    }

    fn pick(&mut self, _len: usize) -> usize {
        self.picks.pop().unwrap_or(0)
    }
}

pub fn test_event(name: &str) -> Event {
    Event {
        name: name.to_string(),
        lat: 48.8534,
        lng: 2.3697,
        year: 1789,
        location: "Paris, France".to_string(),
    }
}

pub fn test_events(names: &[&str]) -> Vec<Event> {
    names.iter().map(|n| test_event(n)).collect()
}

pub fn progress_due(name: &str, days_overdue: i64, now: DateTime<Utc>) -> EventProgress {
    EventProgress {
        event_name: name.to_string(),
        ease_factor: 2.5,
        interval_days: 6,
        repetitions: 2,
        last_quality: 4,
        next_review: now - Duration::days(days_overdue),
        last_review: now - Duration::days(days_overdue + 6),
        total_attempts: 3,
        successful_attempts: 2,
    }
}

pub fn progress_not_due(name: &str, days_until: i64, now: DateTime<Utc>) -> EventProgress {
    EventProgress {
        event_name: name.to_string(),
        ease_factor: 2.5,
        interval_days: 6,
        repetitions: 2,
        last_quality: 4,
        next_review: now + Duration::days(days_until),
        last_review: now - Duration::days(1),
        total_attempts: 3,
        successful_attempts: 2,
    }
}
