//! Data access for per-(user, card) progress rows and their invariants.
//!
//! Rows are created lazily with the documented default state and mutated only
//! through the versioned helpers the review processor drives inside its
//! transaction. Deletion happens solely via the `ON DELETE CASCADE` on the
//! card reference.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::Database;
use crate::error::CoreError;
use crate::model::{KnowledgeLevel, Progress};

const PROGRESS_COLUMNS: &str = r#"
    "id","userId","cardId","knowledgeLevel","repetitionLevel","easeFactor",
    "nextReviewDate","lastReviewedAt","reviewCount","successCount","failureCount",
    "version","createdAt","updatedAt"
"#;

pub async fn get_progress(
    db: &Database,
    user_id: &str,
    card_id: &str,
) -> Result<Option<Progress>, CoreError> {
    let sql = format!(
        r#"SELECT {PROGRESS_COLUMNS} FROM "card_progress" WHERE "userId" = $1 AND "cardId" = $2 LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(card_id)
        .fetch_optional(db.pool())
        .await?;
    Ok(row.map(|row| map_progress_row(&row)))
}

/// Returns the progress row for the pair, creating it with the default state
/// (`repetitionLevel = 0`, `easeFactor = 2.5`, no knowledge level) when the
/// pair has never been reviewed. This is the only read path allowed to
/// materialize a row.
pub async fn get_or_create(
    db: &Database,
    user_id: &str,
    card_id: &str,
    clock: &dyn Clock,
) -> Result<Progress, CoreError> {
    if let Some(existing) = get_progress(db, user_id, card_id).await? {
        return Ok(existing);
    }

    let fresh = Progress::fresh(user_id, card_id, clock.now());
    let mut tx = db.pool().begin().await?;
    let inserted = insert_fresh_tx(&mut tx, &fresh).await?;
    tx.commit().await?;

    if inserted {
        return Ok(fresh);
    }

    // Lost the creation race; the winner's row is authoritative.
    get_progress(db, user_id, card_id)
        .await?
        .ok_or_else(|| CoreError::conflict("progress row vanished during creation"))
}

/// Puts the pair back to the never-reviewed default state, keeping the row.
pub async fn reset_progress(
    db: &Database,
    user_id: &str,
    card_id: &str,
    clock: &dyn Clock,
) -> Result<Progress, CoreError> {
    let now = clock.now().naive_utc();
    let sql = format!(
        r#"
        INSERT INTO "card_progress"
          ("id","userId","cardId","knowledgeLevel","repetitionLevel","easeFactor",
           "nextReviewDate","lastReviewedAt","reviewCount","successCount","failureCount",
           "version","createdAt","updatedAt")
        VALUES ($1,$2,$3,NULL,0,2.5,NULL,NULL,0,0,0,0,$4,$4)
        ON CONFLICT ("userId","cardId") DO UPDATE SET
          "knowledgeLevel" = NULL,
          "repetitionLevel" = 0,
          "easeFactor" = 2.5,
          "nextReviewDate" = NULL,
          "lastReviewedAt" = NULL,
          "reviewCount" = 0,
          "successCount" = 0,
          "failureCount" = 0,
          "version" = "card_progress"."version" + 1,
          "updatedAt" = EXCLUDED."updatedAt"
        RETURNING {PROGRESS_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(card_id)
        .bind(now)
        .fetch_one(db.pool())
        .await?;
    Ok(map_progress_row(&row))
}

/// Progress rows for all of a user's cards, optionally narrowed to one
/// collection. Aggregation input only.
pub async fn list_progress(
    db: &Database,
    user_id: &str,
    collection_id: Option<&str>,
) -> Result<Vec<Progress>, CoreError> {
    let rows = match collection_id {
        Some(collection_id) => {
            sqlx::query(
                r#"
                SELECT
                  p."id",p."userId",p."cardId",p."knowledgeLevel",p."repetitionLevel",p."easeFactor",
                  p."nextReviewDate",p."lastReviewedAt",p."reviewCount",p."successCount",p."failureCount",
                  p."version",p."createdAt",p."updatedAt"
                FROM "card_progress" p
                JOIN "cards" c ON c."id" = p."cardId"
                WHERE p."userId" = $1 AND c."collectionId" = $2
                "#,
            )
                .bind(user_id)
                .bind(collection_id)
                .fetch_all(db.pool())
                .await?
        }
        None => {
            let sql =
                format!(r#"SELECT {PROGRESS_COLUMNS} FROM "card_progress" WHERE "userId" = $1"#);
            sqlx::query(&sql).bind(user_id).fetch_all(db.pool()).await?
        }
    };
    Ok(rows.iter().map(map_progress_row).collect())
}

/// Inserts a fresh row, yielding `false` when another writer created the pair
/// first.
pub(crate) async fn insert_fresh_tx(
    tx: &mut Transaction<'_, Postgres>,
    progress: &Progress,
) -> Result<bool, CoreError> {
    let result = sqlx::query(
        r#"
        INSERT INTO "card_progress"
          ("id","userId","cardId","knowledgeLevel","repetitionLevel","easeFactor",
           "nextReviewDate","lastReviewedAt","reviewCount","successCount","failureCount",
           "version","createdAt","updatedAt")
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        ON CONFLICT ("userId","cardId") DO NOTHING
        "#,
    )
    .bind(&progress.id)
    .bind(&progress.user_id)
    .bind(&progress.card_id)
    .bind(progress.knowledge_level.map(KnowledgeLevel::as_str))
    .bind(progress.repetition_level)
    .bind(progress.ease_factor)
    .bind(progress.next_review_date.map(|d| d.naive_utc()))
    .bind(progress.last_reviewed_at.map(|d| d.naive_utc()))
    .bind(progress.review_count)
    .bind(progress.success_count)
    .bind(progress.failure_count)
    .bind(progress.version)
    .bind(progress.created_at.naive_utc())
    .bind(progress.updated_at.naive_utc())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Writes `next` on top of the row it was derived from, guarded by the
/// version the caller read. Yields `false` when the guard fails, i.e. a
/// concurrent writer got there first.
pub(crate) async fn update_versioned_tx(
    tx: &mut Transaction<'_, Postgres>,
    next: &Progress,
    expected_version: i64,
) -> Result<bool, CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE "card_progress" SET
          "knowledgeLevel" = $1,
          "repetitionLevel" = $2,
          "easeFactor" = $3,
          "nextReviewDate" = $4,
          "lastReviewedAt" = $5,
          "reviewCount" = $6,
          "successCount" = $7,
          "failureCount" = $8,
          "version" = $9,
          "updatedAt" = $10
        WHERE "userId" = $11 AND "cardId" = $12 AND "version" = $13
        "#,
    )
    .bind(next.knowledge_level.map(KnowledgeLevel::as_str))
    .bind(next.repetition_level)
    .bind(next.ease_factor)
    .bind(next.next_review_date.map(|d| d.naive_utc()))
    .bind(next.last_reviewed_at.map(|d| d.naive_utc()))
    .bind(next.review_count)
    .bind(next.success_count)
    .bind(next.failure_count)
    .bind(next.version)
    .bind(next.updated_at.naive_utc())
    .bind(&next.user_id)
    .bind(&next.card_id)
    .bind(expected_version)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) fn map_progress_row(row: &sqlx::postgres::PgRow) -> Progress {
    let knowledge: Option<String> = row.try_get("knowledgeLevel").ok().flatten();
    let next_dt: Option<NaiveDateTime> = row.try_get("nextReviewDate").ok().flatten();
    let last_dt: Option<NaiveDateTime> = row.try_get("lastReviewedAt").ok().flatten();
    let created: NaiveDateTime = row
        .try_get("createdAt")
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated: NaiveDateTime = row
        .try_get("updatedAt")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Progress {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        card_id: row.try_get("cardId").unwrap_or_default(),
        knowledge_level: knowledge.as_deref().and_then(KnowledgeLevel::parse),
        repetition_level: row.try_get::<i64, _>("repetitionLevel").unwrap_or(0),
        ease_factor: row.try_get::<f64, _>("easeFactor").unwrap_or(2.5),
        next_review_date: next_dt.map(naive_to_utc),
        last_reviewed_at: last_dt.map(naive_to_utc),
        review_count: row.try_get::<i64, _>("reviewCount").unwrap_or(0),
        success_count: row.try_get::<i64, _>("successCount").unwrap_or(0),
        failure_count: row.try_get::<i64, _>("failureCount").unwrap_or(0),
        version: row.try_get::<i64, _>("version").unwrap_or(0),
        created_at: naive_to_utc(created),
        updated_at: naive_to_utc(updated),
    }
}

pub(crate) fn naive_to_utc(value: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc)
}
