use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SendAttempt {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub outcome: String,
    pub subject: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of one pass over a claimed contact, written back in a single transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Sent {
        subject: String,
    },
    Failed {
        subject: Option<String>,
        error: String,
    },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }
}
