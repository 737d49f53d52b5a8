use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::SendAttempt;

pub async fn list_by_contact(pool: &PgPool, contact_id: Uuid) -> Result<Vec<SendAttempt>, sqlx::Error> {
    sqlx::query_as::<_, SendAttempt>(
        "SELECT * FROM send_attempts WHERE contact_id = $1 ORDER BY created_at DESC",
    )
    .bind(contact_id)
    .fetch_all(pool)
    .await
}

/// Number of successful deliveries since `since`; this is what the daily cap is measured against.
pub async fn count_sent_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM send_attempts WHERE outcome = 'sent' AND created_at >= $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await
}
