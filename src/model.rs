use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Closed set of review outcomes. Scheduling decisions match on this
/// exhaustively; free-form outcome strings stop at the parse boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewOutcome {
    Wrong,
    Partial,
    Correct,
}

impl ReviewOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wrong => "WRONG",
            Self::Partial => "PARTIAL",
            Self::Correct => "CORRECT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim() {
            "WRONG" => Ok(Self::Wrong),
            "PARTIAL" => Ok(Self::Partial),
            "CORRECT" => Ok(Self::Correct),
            other => Err(CoreError::invalid_argument(format!(
                "unknown review outcome: {other}"
            ))),
        }
    }
}

/// Display-facing label derived from the latest outcome, independent of the
/// interval arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KnowledgeLevel {
    Low,
    Medium,
    High,
}

impl KnowledgeLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    pub const fn from_outcome(outcome: ReviewOutcome) -> Self {
        match outcome {
            ReviewOutcome::Wrong => Self::Low,
            ReviewOutcome::Partial => Self::Medium,
            ReviewOutcome::Correct => Self::High,
        }
    }
}

/// Immutable card reference owned by the catalog collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub collection_id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one review submission; the durable source of truth
/// for all history-derived statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    pub id: String,
    pub user_id: String,
    pub card_id: String,
    pub outcome: ReviewOutcome,
    pub time_spent_ms: i64,
    pub reviewed_at: DateTime<Utc>,
}

/// Mutable per-(user, card) spaced-repetition state. `version` backs the
/// optimistic concurrency check on updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub id: String,
    pub user_id: String,
    pub card_id: String,
    pub knowledge_level: Option<KnowledgeLevel>,
    pub repetition_level: i64,
    pub ease_factor: f64,
    pub next_review_date: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub review_count: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// Default state for a pair that has never been reviewed.
    pub fn fresh(user_id: &str, card_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            card_id: card_id.to_string(),
            knowledge_level: None,
            repetition_level: 0,
            ease_factor: 2.5,
            next_review_date: None,
            last_reviewed_at: None,
            review_count: 0,
            success_count: 0,
            failure_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
