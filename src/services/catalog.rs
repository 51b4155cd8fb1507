//! Read-only seam to the card catalog. The catalog is owned by an external
//! collaborator; the core never mutates these tables.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::Row;

use crate::db::Database;
use crate::error::CoreError;
use crate::model::Card;

pub async fn get_card(db: &Database, card_id: &str) -> Result<Card, CoreError> {
    let row = sqlx::query(
        r#"
        SELECT "id","collectionId","question","answer","createdAt"
        FROM "cards"
        WHERE "id" = $1
        LIMIT 1
        "#,
    )
    .bind(card_id)
    .fetch_optional(db.pool())
    .await?;

    row.map(|row| map_card_row(&row))
        .ok_or_else(|| CoreError::not_found(format!("card {card_id} does not exist")))
}

pub async fn list_cards(db: &Database, collection_id: &str) -> Result<Vec<Card>, CoreError> {
    ensure_collection_exists(db, collection_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT "id","collectionId","question","answer","createdAt"
        FROM "cards"
        WHERE "collectionId" = $1
        ORDER BY "createdAt" ASC
        "#,
    )
    .bind(collection_id)
    .fetch_all(db.pool())
    .await?;

    Ok(rows.iter().map(map_card_row).collect())
}

pub async fn ensure_collection_exists(
    db: &Database,
    collection_id: &str,
) -> Result<(), CoreError> {
    let row = sqlx::query(r#"SELECT 1 AS "one" FROM "collections" WHERE "id" = $1 LIMIT 1"#)
        .bind(collection_id)
        .fetch_optional(db.pool())
        .await?;

    if row.is_none() {
        return Err(CoreError::not_found(format!(
            "collection {collection_id} does not exist"
        )));
    }
    Ok(())
}

pub(crate) fn map_card_row(row: &sqlx::postgres::PgRow) -> Card {
    let created: NaiveDateTime = row
        .try_get("createdAt")
        .unwrap_or_else(|_| Utc::now().naive_utc());
    Card {
        id: row.try_get("id").unwrap_or_default(),
        collection_id: row.try_get("collectionId").unwrap_or_default(),
        question: row.try_get("question").unwrap_or_default(),
        answer: row.try_get("answer").unwrap_or_default(),
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(created, Utc),
    }
}
