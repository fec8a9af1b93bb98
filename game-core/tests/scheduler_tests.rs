mod common;

use chrono::{Duration, Utc};
use common::*;
use game_core::{
    DEFAULT_MAX_NEW_PER_SESSION, next_review, quality, select_next_event,
};
use game_types::LearnednessLevel;

#[test]
fn overdue_tier_wins_below_seventy_percent() {
    let now = Utc::now();
    let events = test_events(&["overdue", "new"]);
    let records = vec![progress_due("overdue", 3, now)];

    let mut rng = FixedSource::constant(0.5);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "overdue");
    assert!(picked.progress.is_some());
}

#[test]
fn most_overdue_item_ranks_first() {
    let now = Utc::now();
    let events = test_events(&["slightly", "very"]);
    let records = vec![
        progress_due("slightly", 1, now),
        progress_due("very", 30, now),
    ];

    let mut rng = FixedSource::constant(0.0);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "very");
}

#[test]
fn new_tier_takes_the_twenty_percent_band() {
    let now = Utc::now();
    let events = test_events(&["overdue", "new"]);
    let records = vec![progress_due("overdue", 3, now)];

    // Draw in [0.7, 0.9): a new event if any are available
    let mut rng = FixedSource::new(vec![0.8], vec![0]);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "new");
    assert!(picked.progress.is_none());
}

#[test]
fn empty_new_tier_falls_through_to_overdue() {
    let now = Utc::now();
    let events = test_events(&["a", "b"]);
    let records = vec![progress_due("a", 1, now), progress_due("b", 2, now)];

    // Draw that would prefer the new tier, which is empty
    let mut rng = FixedSource::constant(0.85);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "b");
}

#[test]
fn empty_overdue_tier_falls_through_to_new() {
    let now = Utc::now();
    let events = test_events(&["scheduled", "new"]);
    let records = vec![progress_not_due("scheduled", 5, now)];

    let mut rng = FixedSource::new(vec![0.1], vec![0]);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "new");
}

#[test]
fn nothing_due_previews_the_soonest_scheduled_event() {
    let now = Utc::now();
    let events = test_events(&["later", "sooner"]);
    let records = vec![
        progress_not_due("later", 10, now),
        progress_not_due("sooner", 2, now),
    ];

    // Above 0.9 with nothing overdue and nothing new
    let mut rng = FixedSource::constant(0.95);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "sooner");
}

#[test]
fn seen_but_never_passed_counts_as_overdue() {
    let now = Utc::now();
    let events = test_events(&["failed", "new"]);
    let mut failed = progress_due("failed", 0, now);
    failed.repetitions = 0;
    failed.successful_attempts = 0;
    let records = vec![failed];

    let mut rng = FixedSource::constant(0.3);
    let picked = select_next_event(&events, &records, DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng)
        .unwrap();
    assert_eq!(picked.event.name, "failed");
}

#[test]
fn daily_cap_gates_new_introductions() {
    let now = Utc::now();
    let events = test_events(&["introduced", "held_back"]);

    // One card already introduced today (first repetition, reviewed now)
    let mut introduced = progress_due("introduced", 0, now);
    introduced.repetitions = 1;
    introduced.last_review = now;
    let records = vec![introduced];

    // Cap of 1 new card per day is already spent, so the never-seen
    // event is not eligible; the introduced card is due again instead.
    let mut rng = FixedSource::constant(0.85);
    let picked = select_next_event(&events, &records, 1, now, &mut rng).unwrap();
    assert_eq!(picked.event.name, "introduced");
}

#[test]
fn empty_event_list_selects_nothing() {
    let now = Utc::now();
    let mut rng = FixedSource::constant(0.5);
    assert!(select_next_event(&[], &[], DEFAULT_MAX_NEW_PER_SESSION, now, &mut rng).is_none());
}

#[test]
fn first_perfect_attempt_schedules_one_day_out() {
    // A never-seen event answered with zero year error from 5 km away
    let now = Utc::now();
    let q = quality(0, 5.0);
    assert_eq!(q, 5);

    let update = next_review(None, q, now);
    assert_eq!(update.repetitions, 1);
    assert_eq!(update.interval_days, 1);
    assert!(update.ease_factor > 2.5);
    assert_eq!(update.next_review, now + Duration::days(1));
}

#[test]
fn learnedness_progression_over_a_study_run() {
    let now = Utc::now();
    let events = test_events(&["event"]);

    // Simulate four consecutive perfect reviews
    let mut state = None;
    let mut reps = 0;
    let mut ease = 2.5;
    let mut interval = 1;
    for _ in 0..4 {
        let update = next_review(state.as_ref(), 5, now);
        reps = update.repetitions;
        ease = update.ease_factor;
        interval = update.interval_days;
        state = Some(game_core::ReviewState {
            ease_factor: ease,
            interval_days: interval,
            repetitions: reps,
        });
    }

    let record = game_core::EventProgress {
        event_name: "event".to_string(),
        ease_factor: ease,
        interval_days: interval,
        repetitions: reps,
        last_quality: 5,
        next_review: now + Duration::days(interval as i64),
        last_review: now,
        total_attempts: 4,
        successful_attempts: 4,
    };

    let l = game_core::learnedness(Some(&record));
    assert_eq!(l.level, LearnednessLevel::Mastered);
    assert!(l.percentage > 66);
    assert_eq!(game_core::category_learnedness(&events, &[record]), l.percentage);
}
