//! Review Outcome Processor: the only write path for progress rows and
//! review events.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::Database;
use crate::error::CoreError;
use crate::model::{Progress, ReviewEvent, ReviewOutcome};
use crate::scheduler;
use crate::services::{catalog, progress, users};

/// Per-(user, card) async locks. The outer map is guarded by a plain mutex;
/// entries are created on demand and never removed, which is fine for the
/// working-set sizes a single process sees.
#[derive(Default)]
struct KeyLocks {
    map: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn lock_for(&self, user_id: &str, card_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = (user_id.to_string(), card_id.to_string());
        let mut map = self.map.lock();
        Arc::clone(map.entry(key).or_default())
    }
}

pub struct ReviewProcessor {
    db: Database,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
}

impl ReviewProcessor {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            locks: KeyLocks::default(),
        }
    }

    /// Applies one review submission: advances the progress row and appends
    /// the immutable event, committed as one transaction.
    ///
    /// Writers racing on the same (user, card) pair are serialized by an
    /// in-process lock; a version guard on the row catches writers in other
    /// processes and surfaces as [`CoreError::Conflict`], which the caller
    /// may retry.
    pub async fn process_review(
        &self,
        card_id: &str,
        user_id: &str,
        outcome: ReviewOutcome,
        time_spent_ms: i64,
    ) -> Result<Progress, CoreError> {
        if time_spent_ms < 0 {
            return Err(CoreError::invalid_argument(
                "timeSpentMs must be non-negative",
            ));
        }

        users::ensure_user_exists(&self.db, user_id).await?;
        catalog::get_card(&self.db, card_id).await?;

        let key_lock = self.locks.lock_for(user_id, card_id);
        let _serialized = key_lock.lock().await;

        let now = self.clock.now();
        let (current, persisted) = match progress::get_progress(&self.db, user_id, card_id).await? {
            Some(existing) => (existing, true),
            None => (Progress::fresh(user_id, card_id, now), false),
        };
        let expected_version = current.version;

        let mut next = scheduler::apply_review(&current, outcome, now);
        next.version = expected_version + 1;

        let event = ReviewEvent {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            card_id: card_id.to_string(),
            outcome,
            time_spent_ms,
            reviewed_at: now,
        };

        let mut tx = self.db.pool().begin().await?;

        let written = if persisted {
            progress::update_versioned_tx(&mut tx, &next, expected_version).await?
        } else {
            progress::insert_fresh_tx(&mut tx, &next).await?
        };
        if !written {
            tx.rollback().await?;
            return Err(CoreError::conflict(format!(
                "concurrent review update on ({user_id}, {card_id})"
            )));
        }

        insert_event_tx(&mut tx, &event).await?;
        tx.commit().await?;

        tracing::info!(
            user_id,
            card_id,
            outcome = outcome.as_str(),
            repetition_level = next.repetition_level,
            ease_factor = next.ease_factor,
            "review processed"
        );

        Ok(next)
    }
}

async fn insert_event_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &ReviewEvent,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO "review_events"
          ("id","userId","cardId","outcome","timeSpentMs","reviewedAt")
        VALUES ($1,$2,$3,$4,$5,$6)
        "#,
    )
    .bind(&event.id)
    .bind(&event.user_id)
    .bind(&event.card_id)
    .bind(event.outcome.as_str())
    .bind(event.time_spent_ms)
    .bind(event.reviewed_at.naive_utc())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
