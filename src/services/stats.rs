//! Streak & Aggregate Engine: derives dashboard statistics from the review
//! event log and progress snapshots.
//!
//! The storage layer only fetches snapshots; every derived number comes out
//! of [`aggregate`], which is pure over its inputs and takes "now" as a
//! parameter. Calendar days are UTC dates.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::Row;

use crate::clock::Clock;
use crate::db::Database;
use crate::error::CoreError;
use crate::model::{KnowledgeLevel, ReviewOutcome};
use crate::services::catalog;
use crate::services::progress::{self, naive_to_utc};

const DAILY_ACCURACY_DAYS: i64 = 14;

/// What the statistics are computed over: everything a user studies, or one
/// collection of theirs.
#[derive(Debug, Clone)]
pub enum StatsScope {
    User { user_id: String },
    Collection { user_id: String, collection_id: String },
}

impl StatsScope {
    fn user_id(&self) -> &str {
        match self {
            Self::User { user_id } => user_id,
            Self::Collection { user_id, .. } => user_id,
        }
    }

    fn collection_id(&self) -> Option<&str> {
        match self {
            Self::User { .. } => None,
            Self::Collection { collection_id, .. } => Some(collection_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub created_today: i64,
    pub created_last_7_days: i64,
    pub created_last_30_days: i64,
    pub reviewed_today: i64,
    pub reviewed_last_7_days: i64,
    pub reviewed_last_30_days: i64,
    pub total_cards: i64,
    pub total_reviews: i64,
    /// Percent of cards in scope with at least one review.
    pub review_rate: f64,
    /// Percent of reviews with outcome CORRECT; 0 when there are none.
    pub success_rate: f64,
    /// Mean time spent per review, in seconds.
    pub average_time_seconds: f64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub study_days: i64,
    pub daily_accuracy: Vec<DailyAccuracy>,
    pub knowledge_distribution: KnowledgeDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAccuracy {
    pub date: NaiveDate,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDistribution {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub unrated: i64,
}

/// Snapshot of one card for aggregation.
#[derive(Debug, Clone)]
pub struct CardSnapshot {
    pub created_at: DateTime<Utc>,
}

/// Snapshot of one review event for aggregation.
#[derive(Debug, Clone)]
pub struct EventSnapshot {
    pub card_id: String,
    pub outcome: ReviewOutcome,
    pub time_spent_ms: i64,
    pub reviewed_at: DateTime<Utc>,
}

pub async fn compute_stats(
    db: &Database,
    scope: StatsScope,
    clock: &dyn Clock,
) -> Result<StatsSnapshot, CoreError> {
    if let Some(collection_id) = scope.collection_id() {
        catalog::ensure_collection_exists(db, collection_id).await?;
    }

    let cards = fetch_card_snapshots(db, &scope).await?;
    let events = fetch_event_snapshots(db, &scope).await?;
    let levels = progress::list_progress(db, scope.user_id(), scope.collection_id())
        .await?
        .into_iter()
        .map(|p| p.knowledge_level)
        .collect::<Vec<_>>();

    Ok(aggregate(&cards, &events, &levels, clock.now()))
}

/// Pure derivation of the whole snapshot. An empty input set yields the
/// all-zero snapshot.
pub fn aggregate(
    cards: &[CardSnapshot],
    events: &[EventSnapshot],
    levels: &[Option<KnowledgeLevel>],
    now: DateTime<Utc>,
) -> StatsSnapshot {
    let today = now.date_naive();
    let today_start = today.and_time(chrono::NaiveTime::MIN);
    let week_start = today_start - Duration::days(7);
    let month_start = today_start - Duration::days(30);
    let now_naive = now.naive_utc();

    let in_window = |at: NaiveDateTime, start: NaiveDateTime| at >= start && at < now_naive;

    let created_today = cards
        .iter()
        .filter(|c| in_window(c.created_at.naive_utc(), today_start))
        .count() as i64;
    let created_last_7_days = cards
        .iter()
        .filter(|c| in_window(c.created_at.naive_utc(), week_start))
        .count() as i64;
    let created_last_30_days = cards
        .iter()
        .filter(|c| in_window(c.created_at.naive_utc(), month_start))
        .count() as i64;

    let reviewed_today = events
        .iter()
        .filter(|e| in_window(e.reviewed_at.naive_utc(), today_start))
        .count() as i64;
    let reviewed_last_7_days = events
        .iter()
        .filter(|e| in_window(e.reviewed_at.naive_utc(), week_start))
        .count() as i64;
    let reviewed_last_30_days = events
        .iter()
        .filter(|e| in_window(e.reviewed_at.naive_utc(), month_start))
        .count() as i64;

    let total_cards = cards.len() as i64;
    let total_reviews = events.len() as i64;

    let reviewed_cards = events
        .iter()
        .map(|e| e.card_id.as_str())
        .collect::<HashSet<_>>()
        .len() as i64;
    let review_rate = percent(reviewed_cards, total_cards);

    let correct_reviews = events
        .iter()
        .filter(|e| e.outcome == ReviewOutcome::Correct)
        .count() as i64;
    let success_rate = percent(correct_reviews, total_reviews);

    let average_time_seconds = if events.is_empty() {
        0.0
    } else {
        let total_ms: i64 = events.iter().map(|e| e.time_spent_ms).sum();
        total_ms as f64 / events.len() as f64 / 1000.0
    };

    let study_dates: BTreeSet<NaiveDate> = events
        .iter()
        .map(|e| e.reviewed_at.date_naive())
        .collect();

    let mut distribution = KnowledgeDistribution::default();
    for level in levels {
        match level {
            Some(KnowledgeLevel::Low) => distribution.low += 1,
            Some(KnowledgeLevel::Medium) => distribution.medium += 1,
            Some(KnowledgeLevel::High) => distribution.high += 1,
            None => distribution.unrated += 1,
        }
    }

    StatsSnapshot {
        created_today,
        created_last_7_days,
        created_last_30_days,
        reviewed_today,
        reviewed_last_7_days,
        reviewed_last_30_days,
        total_cards,
        total_reviews,
        review_rate,
        success_rate,
        average_time_seconds,
        current_streak: current_streak(&study_dates, today),
        longest_streak: longest_streak(&study_dates),
        study_days: study_dates.len() as i64,
        daily_accuracy: daily_accuracy(events, today),
        knowledge_distribution: distribution,
    }
}

/// Consecutive study days ending at today or yesterday. A gap of more than
/// one day breaks the streak entirely.
pub fn current_streak(study_dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> i64 {
    let yesterday = today - Duration::days(1);
    let anchor = if study_dates.contains(&today) {
        today
    } else if study_dates.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 1;
    let mut cursor = anchor - Duration::days(1);
    while study_dates.contains(&cursor) {
        streak += 1;
        cursor = cursor - Duration::days(1);
    }
    streak
}

/// Longest run of calendar days with gap exactly one, over the sorted
/// distinct study-day set.
pub fn longest_streak(study_dates: &BTreeSet<NaiveDate>) -> i64 {
    let mut longest = 0i64;
    let mut run = 0i64;
    let mut previous: Option<NaiveDate> = None;

    for &date in study_dates {
        run = match previous {
            Some(prev) if date - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

fn daily_accuracy(events: &[EventSnapshot], today: NaiveDate) -> Vec<DailyAccuracy> {
    let window_start = today - Duration::days(DAILY_ACCURACY_DAYS - 1);
    let mut per_day: std::collections::BTreeMap<NaiveDate, (i64, i64)> =
        std::collections::BTreeMap::new();

    for event in events {
        let date = event.reviewed_at.date_naive();
        if date < window_start || date > today {
            continue;
        }
        let entry = per_day.entry(date).or_default();
        entry.0 += 1;
        if event.outcome == ReviewOutcome::Correct {
            entry.1 += 1;
        }
    }

    per_day
        .into_iter()
        .map(|(date, (total, correct))| DailyAccuracy {
            date,
            accuracy: if total > 0 {
                correct as f64 / total as f64
            } else {
                0.0
            },
        })
        .collect()
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

async fn fetch_card_snapshots(
    db: &Database,
    scope: &StatsScope,
) -> Result<Vec<CardSnapshot>, CoreError> {
    let rows = match scope.collection_id() {
        Some(collection_id) => {
            sqlx::query(r#"SELECT "createdAt" FROM "cards" WHERE "collectionId" = $1"#)
                .bind(collection_id)
                .fetch_all(db.pool())
                .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT c."createdAt"
                FROM "cards" c
                JOIN "collections" col ON col."id" = c."collectionId"
                WHERE col."userId" = $1
                "#,
            )
            .bind(scope.user_id())
            .fetch_all(db.pool())
            .await?
        }
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let created: NaiveDateTime = row
                .try_get("createdAt")
                .unwrap_or_else(|_| Utc::now().naive_utc());
            CardSnapshot {
                created_at: naive_to_utc(created),
            }
        })
        .collect())
}

async fn fetch_event_snapshots(
    db: &Database,
    scope: &StatsScope,
) -> Result<Vec<EventSnapshot>, CoreError> {
    let rows = match scope.collection_id() {
        Some(collection_id) => {
            sqlx::query(
                r#"
                SELECT e."cardId", e."outcome", e."timeSpentMs", e."reviewedAt"
                FROM "review_events" e
                JOIN "cards" c ON c."id" = e."cardId"
                WHERE e."userId" = $1 AND c."collectionId" = $2
                "#,
            )
            .bind(scope.user_id())
            .bind(collection_id)
            .fetch_all(db.pool())
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT "cardId", "outcome", "timeSpentMs", "reviewedAt"
                FROM "review_events"
                WHERE "userId" = $1
                "#,
            )
            .bind(scope.user_id())
            .fetch_all(db.pool())
            .await?
        }
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let outcome: String = row.try_get("outcome").unwrap_or_default();
            let reviewed: NaiveDateTime = row
                .try_get("reviewedAt")
                .unwrap_or_else(|_| Utc::now().naive_utc());
            EventSnapshot {
                card_id: row.try_get("cardId").unwrap_or_default(),
                outcome: ReviewOutcome::parse(&outcome).unwrap_or(ReviewOutcome::Wrong),
                time_spent_ms: row.try_get::<i64, _>("timeSpentMs").unwrap_or(0),
                reviewed_at: naive_to_utc(reviewed),
            }
        })
        .collect())
}
