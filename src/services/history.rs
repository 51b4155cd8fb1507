//! Paginated listing of the review-event log, newest first.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::Row;

use crate::db::Database;
use crate::error::CoreError;
use crate::model::{ReviewEvent, ReviewOutcome};
use crate::services::progress::naive_to_utc;

#[derive(Debug, Clone, Default)]
pub struct PaginationOptions {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedEvents {
    pub data: Vec<ReviewEvent>,
    pub pagination: Pagination,
}

pub async fn list_events(
    db: &Database,
    user_id: &str,
    card_id: Option<&str>,
    options: PaginationOptions,
) -> Result<PaginatedEvents, CoreError> {
    let page = options.page.unwrap_or(1).max(1);
    let page_size = options.page_size.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * page_size;

    let (data, total) = tokio::try_join!(
        select_events(db, user_id, card_id, page_size, offset),
        count_events(db, user_id, card_id),
    )?;

    let total_pages = if total > 0 {
        (total + page_size - 1) / page_size
    } else {
        0
    };

    Ok(PaginatedEvents {
        data,
        pagination: Pagination {
            page,
            page_size,
            total,
            total_pages,
        },
    })
}

async fn select_events(
    db: &Database,
    user_id: &str,
    card_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ReviewEvent>, CoreError> {
    let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        r#"
        SELECT "id","userId","cardId","outcome","timeSpentMs","reviewedAt"
        FROM "review_events"
        WHERE "userId" =
        "#,
    );
    qb.push_bind(user_id);
    if let Some(card_id) = card_id {
        qb.push(" AND \"cardId\" = ");
        qb.push_bind(card_id);
    }
    qb.push(" ORDER BY \"reviewedAt\" DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb.build().fetch_all(db.pool()).await?;
    Ok(rows.iter().map(map_event_row).collect())
}

async fn count_events(
    db: &Database,
    user_id: &str,
    card_id: Option<&str>,
) -> Result<i64, CoreError> {
    let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        r#"SELECT COUNT(*) as "count" FROM "review_events" WHERE "userId" = "#,
    );
    qb.push_bind(user_id);
    if let Some(card_id) = card_id {
        qb.push(" AND \"cardId\" = ");
        qb.push_bind(card_id);
    }
    let row = qb.build().fetch_one(db.pool()).await?;
    Ok(row.try_get::<i64, _>("count").unwrap_or(0))
}

pub(crate) fn map_event_row(row: &sqlx::postgres::PgRow) -> ReviewEvent {
    let outcome: String = row.try_get("outcome").unwrap_or_default();
    let reviewed: NaiveDateTime = row
        .try_get("reviewedAt")
        .unwrap_or_else(|_| chrono::Utc::now().naive_utc());
    ReviewEvent {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        card_id: row.try_get("cardId").unwrap_or_default(),
        outcome: ReviewOutcome::parse(&outcome).unwrap_or(ReviewOutcome::Wrong),
        time_spent_ms: row.try_get::<i64, _>("timeSpentMs").unwrap_or(0),
        reviewed_at: naive_to_utc(reviewed),
    }
}
