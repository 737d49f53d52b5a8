use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Resume {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
    pub sha256: String,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
}

/// Resume metadata without the file body.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ResumeInfo {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: i32,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}
