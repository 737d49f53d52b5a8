use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::InProgress => "in_progress",
            ContactStatus::Sent => "sent",
            ContactStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub serial_number: i32,
    pub name: String,
    pub email: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub status: ContactStatus,
    #[serde(skip_serializing)]
    pub claim_id: Option<Uuid>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A contact as it arrives from an import, before it has an id or a status.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContact {
    pub serial_number: i32,
    pub name: String,
    pub email: String,
    pub title: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub sent: i64,
    pub failed: i64,
}
