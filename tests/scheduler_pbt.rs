//! Property-based tests for the SM-2 transition arithmetic.
//!
//! Invariants covered:
//! - The ease factor never falls below the 1.3 floor for any outcome sequence
//! - CORRECT-only runs strictly increase the repetition level and never
//!   decrease the ease factor
//! - WRONG always zeroes the repetition level and re-queues at the review
//!   instant
//! - The next review date never precedes the review that set it

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use mnemo_core::model::{Progress, ReviewOutcome};
use mnemo_core::scheduler::{apply_review, EASE_FLOOR};

fn arb_outcome() -> impl Strategy<Value = ReviewOutcome> {
    prop_oneof![
        Just(ReviewOutcome::Wrong),
        Just(ReviewOutcome::Partial),
        Just(ReviewOutcome::Correct),
    ]
}

fn arb_outcome_seq() -> impl Strategy<Value = Vec<ReviewOutcome>> {
    proptest::collection::vec(arb_outcome(), 1..64)
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

fn replay(outcomes: &[ReviewOutcome]) -> Vec<Progress> {
    let mut states = Vec::with_capacity(outcomes.len());
    let mut current = Progress::fresh("user", "card", start());
    for (i, &outcome) in outcomes.iter().enumerate() {
        current = apply_review(&current, outcome, start() + Duration::days(i as i64));
        states.push(current.clone());
    }
    states
}

proptest! {
    #[test]
    fn ease_factor_never_falls_below_the_floor(outcomes in arb_outcome_seq()) {
        for state in replay(&outcomes) {
            prop_assert!(state.ease_factor >= EASE_FLOOR - 1e-12);
        }
    }

    #[test]
    fn correct_only_runs_are_monotone(n in 1usize..40) {
        let outcomes = vec![ReviewOutcome::Correct; n];
        let states = replay(&outcomes);
        for (i, window) in states.windows(2).enumerate() {
            prop_assert_eq!(window[0].repetition_level, (i + 1) as i64);
            prop_assert!(window[1].repetition_level > window[0].repetition_level);
            prop_assert!(window[1].ease_factor >= window[0].ease_factor);
        }
        prop_assert_eq!(states.last().unwrap().repetition_level, n as i64);
    }

    #[test]
    fn wrong_always_zeroes_the_level_and_requeues(outcomes in arb_outcome_seq()) {
        let states = replay(&outcomes);
        for (state, &outcome) in states.iter().zip(&outcomes) {
            if outcome == ReviewOutcome::Wrong {
                prop_assert_eq!(state.repetition_level, 0);
                prop_assert_eq!(state.next_review_date, state.last_reviewed_at);
            }
        }
    }

    #[test]
    fn next_review_never_precedes_the_review(outcomes in arb_outcome_seq()) {
        for state in replay(&outcomes) {
            let next = state.next_review_date.expect("reviewed state has a next date");
            let last = state.last_reviewed_at.expect("reviewed state has a last date");
            prop_assert!(next >= last);
        }
    }

    #[test]
    fn review_count_tracks_the_event_count(outcomes in arb_outcome_seq()) {
        let states = replay(&outcomes);
        let last = states.last().unwrap();
        prop_assert_eq!(last.review_count, outcomes.len() as i64);

        let corrects = outcomes.iter().filter(|&&o| o == ReviewOutcome::Correct).count() as i64;
        let wrongs = outcomes.iter().filter(|&&o| o == ReviewOutcome::Wrong).count() as i64;
        prop_assert_eq!(last.success_count, corrects);
        prop_assert_eq!(last.failure_count, wrongs);
    }
}
