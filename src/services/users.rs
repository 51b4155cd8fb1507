//! Read-only seam to the user directory.

use sqlx::Row;

use crate::db::Database;
use crate::error::CoreError;

pub async fn ensure_user_exists(db: &Database, user_id: &str) -> Result<(), CoreError> {
    let row = sqlx::query(r#"SELECT 1 AS "one" FROM "users" WHERE "id" = $1 LIMIT 1"#)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?;

    if row.is_none() {
        return Err(CoreError::not_found(format!("user {user_id} does not exist")));
    }
    Ok(())
}

/// Resolves an external principal (email) to the internal user id.
pub async fn find_user_by_email(db: &Database, email: &str) -> Result<Option<String>, CoreError> {
    let row = sqlx::query(r#"SELECT "id" FROM "users" WHERE "email" = $1 LIMIT 1"#)
        .bind(email)
        .fetch_optional(db.pool())
        .await?;

    Ok(row.and_then(|row| row.try_get::<String, _>("id").ok()))
}
