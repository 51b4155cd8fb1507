use chrono::{DateTime, Duration, Utc};

use crate::model::{KnowledgeLevel, Progress, ReviewOutcome};

/// Lower bound the ease factor is clamped to after every update (SM-2).
pub const EASE_FLOOR: f64 = 1.3;

const EASE_GAIN_CORRECT: f64 = 0.1;
const EASE_LOSS_PARTIAL: f64 = 0.1;
const EASE_LOSS_WRONG: f64 = 0.2;

/// Retry horizon for a partially-recalled card.
const PARTIAL_RETRY_DAYS: i64 = 1;

/// Review interval in days, looked up by the post-increment repetition level.
pub fn interval_days(repetition_level: i64) -> i64 {
    match repetition_level {
        0 => 1,
        1 => 3,
        2 => 7,
        3 => 14,
        4 => 30,
        _ => 60,
    }
}

/// Applies one review outcome to a progress record at an explicit `now`.
///
/// Pure over its inputs: the caller owns persistence and atomicity. The
/// returned record preserves the scheduling invariants: the repetition level
/// zeroes on WRONG, the ease factor never drops below [`EASE_FLOOR`], and
/// `next_review_date` never precedes `last_reviewed_at` (WRONG re-queues at
/// exactly `now`).
pub fn apply_review(progress: &Progress, outcome: ReviewOutcome, now: DateTime<Utc>) -> Progress {
    let mut next = progress.clone();

    match outcome {
        ReviewOutcome::Correct => {
            next.repetition_level += 1;
            next.ease_factor = clamp_ease(progress.ease_factor + EASE_GAIN_CORRECT);
            next.next_review_date = Some(now + Duration::days(interval_days(next.repetition_level)));
            next.success_count += 1;
        }
        ReviewOutcome::Partial => {
            next.ease_factor = clamp_ease(progress.ease_factor - EASE_LOSS_PARTIAL);
            next.next_review_date = Some(now + Duration::days(PARTIAL_RETRY_DAYS));
        }
        ReviewOutcome::Wrong => {
            next.repetition_level = 0;
            next.ease_factor = clamp_ease(progress.ease_factor - EASE_LOSS_WRONG);
            next.next_review_date = Some(now);
            next.failure_count += 1;
        }
    }

    next.knowledge_level = Some(KnowledgeLevel::from_outcome(outcome));
    next.last_reviewed_at = Some(now);
    next.review_count += 1;
    next.updated_at = now;

    next
}

fn clamp_ease(value: f64) -> f64 {
    value.max(EASE_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    fn fresh() -> Progress {
        Progress::fresh("u1", "c1", day(0))
    }

    #[test]
    fn three_corrects_land_on_the_fourteen_day_interval() {
        let p0 = fresh();
        let p1 = apply_review(&p0, ReviewOutcome::Correct, day(0));
        let p2 = apply_review(&p1, ReviewOutcome::Correct, day(1));
        let p3 = apply_review(&p2, ReviewOutcome::Correct, day(4));

        assert_eq!(p3.repetition_level, 3);
        assert!((p3.ease_factor - 2.8).abs() < 1e-9);
        assert_eq!(p3.next_review_date, Some(day(4) + Duration::days(14)));
        assert_eq!(p3.review_count, 3);
        assert_eq!(p3.success_count, 3);
        assert_eq!(p3.knowledge_level, Some(KnowledgeLevel::High));
    }

    #[test]
    fn wrong_resets_level_and_requeues_immediately() {
        let mut p = fresh();
        p.repetition_level = 4;
        p.ease_factor = 2.0;

        let after = apply_review(&p, ReviewOutcome::Wrong, day(2));
        assert_eq!(after.repetition_level, 0);
        assert!((after.ease_factor - 1.8).abs() < 1e-9);
        assert_eq!(after.next_review_date, after.last_reviewed_at);
        assert_eq!(after.failure_count, 1);
        assert_eq!(after.knowledge_level, Some(KnowledgeLevel::Low));
    }

    #[test]
    fn partial_holds_the_ease_floor_and_level() {
        let mut p = fresh();
        p.repetition_level = 2;
        p.ease_factor = EASE_FLOOR;

        let after = apply_review(&p, ReviewOutcome::Partial, day(3));
        assert_eq!(after.ease_factor, EASE_FLOOR);
        assert_eq!(after.repetition_level, 2);
        assert_eq!(after.next_review_date, Some(day(3) + Duration::days(1)));
        assert_eq!(after.success_count, 0);
        assert_eq!(after.failure_count, 0);
        assert_eq!(after.knowledge_level, Some(KnowledgeLevel::Medium));
    }

    #[test]
    fn interval_table_saturates_past_level_four() {
        assert_eq!(interval_days(0), 1);
        assert_eq!(interval_days(4), 30);
        assert_eq!(interval_days(5), 60);
        assert_eq!(interval_days(40), 60);
    }

    #[test]
    fn partial_does_not_count_toward_either_tally() {
        let p = apply_review(&fresh(), ReviewOutcome::Partial, day(0));
        assert_eq!(p.review_count, 1);
        assert_eq!(p.success_count, 0);
        assert_eq!(p.failure_count, 0);
    }
}
