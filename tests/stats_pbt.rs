//! Property-based tests for streak derivation over arbitrary study-day sets.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use mnemo_core::services::stats::{current_streak, longest_streak};

fn arb_study_days() -> impl Strategy<Value = BTreeSet<NaiveDate>> {
    let epoch = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    proptest::collection::btree_set((0i64..200).prop_map(move |n| epoch + Duration::days(n)), 0..80)
}

proptest! {
    #[test]
    fn longest_streak_dominates_current_streak(
        days in arb_study_days(),
        today_offset in 0i64..220,
    ) {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(today_offset);
        prop_assert!(longest_streak(&days) >= current_streak(&days, today));
    }

    #[test]
    fn current_streak_is_zero_without_recent_activity(days in arb_study_days()) {
        let today = match days.iter().next_back() {
            Some(&last) => last + Duration::days(3),
            None => NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        prop_assert_eq!(current_streak(&days, today), 0);
    }

    #[test]
    fn longest_streak_is_bounded_by_the_day_count(days in arb_study_days()) {
        let longest = longest_streak(&days);
        prop_assert!(longest >= 0);
        prop_assert!(longest <= days.len() as i64);
        if !days.is_empty() {
            prop_assert!(longest >= 1);
        }
    }

    #[test]
    fn a_full_run_is_its_own_longest_streak(len in 1i64..60) {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let days: BTreeSet<NaiveDate> = (0..len).map(|n| start + Duration::days(n)).collect();
        let today = start + Duration::days(len - 1);
        prop_assert_eq!(longest_streak(&days), len);
        prop_assert_eq!(current_streak(&days, today), len);
    }
}
