use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::models::{Resume, ResumeInfo};

const RESUME_LOCK_KEY: i64 = 0x7265_7375_6d65;

pub async fn find_active(pool: &PgPool) -> Result<Option<Resume>, sqlx::Error> {
    sqlx::query_as::<_, Resume>(
        "SELECT * FROM resumes WHERE is_active ORDER BY uploaded_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

pub async fn find_active_info(pool: &PgPool) -> Result<Option<ResumeInfo>, sqlx::Error> {
    sqlx::query_as::<_, ResumeInfo>(
        "SELECT id, filename, content_type, octet_length(content) AS size, sha256, uploaded_at
         FROM resumes WHERE is_active ORDER BY uploaded_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

/// Store a new resume in place of the current one.
pub async fn replace_active(
    pool: &PgPool,
    filename: &str,
    content_type: &str,
    content: &[u8],
) -> Result<ResumeInfo, sqlx::Error> {
    let sha256 = hex::encode(Sha256::digest(content));

    let mut tx = pool.begin().await?;

    // Serializes concurrent uploads; released on commit or rollback.
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(RESUME_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM resumes")
        .execute(&mut *tx)
        .await?;

    let info = sqlx::query_as::<_, ResumeInfo>(
        "INSERT INTO resumes (filename, content_type, content, sha256)
         VALUES ($1, $2, $3, $4)
         RETURNING id, filename, content_type, octet_length(content) AS size, sha256, uploaded_at",
    )
    .bind(filename)
    .bind(content_type)
    .bind(content)
    .bind(sha256)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(info)
}
