use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Contact, ContactStats, ContactStatus, NewContact, SendOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpsertSummary {
    pub inserted: u64,
    pub updated: u64,
}

/// Insert or refresh contacts keyed by email. An existing contact keeps its status, so a
/// re-import never re-queues someone who was already sent to.
pub async fn upsert_bulk(pool: &PgPool, contacts: &[NewContact]) -> Result<UpsertSummary, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut summary = UpsertSummary::default();

    for contact in contacts {
        // xmax is zero only for a freshly inserted tuple
        let inserted: bool = sqlx::query_scalar(
            "INSERT INTO contacts (serial_number, name, email, title, company)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (email) DO UPDATE SET
                 serial_number = EXCLUDED.serial_number,
                 name = EXCLUDED.name,
                 title = EXCLUDED.title,
                 company = EXCLUDED.company,
                 updated_at = now()
             RETURNING (xmax = 0)",
        )
        .bind(contact.serial_number)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.title)
        .bind(&contact.company)
        .fetch_one(&mut *tx)
        .await?;

        if inserted {
            summary.inserted += 1;
        } else {
            summary.updated += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_status(
    pool: &PgPool,
    status: ContactStatus,
    limit: i64,
    offset: i64,
) -> Result<Vec<Contact>, sqlx::Error> {
    // Pending contacts are listed in send order, the rest by most recent activity.
    let order = match status {
        ContactStatus::Pending | ContactStatus::InProgress => "serial_number ASC, created_at ASC, id ASC",
        ContactStatus::Sent | ContactStatus::Failed => "updated_at DESC, id ASC",
    };

    sqlx::query_as::<_, Contact>(&format!(
        "SELECT * FROM contacts WHERE status = $1 ORDER BY {order} LIMIT $2 OFFSET $3"
    ))
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_by_status(pool: &PgPool, status: ContactStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
}

pub async fn stats(pool: &PgPool) -> Result<ContactStats, sqlx::Error> {
    let rows: Vec<(ContactStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM contacts GROUP BY status")
            .fetch_all(pool)
            .await?;

    let mut stats = ContactStats::default();
    for (status, count) in rows {
        match status {
            ContactStatus::Pending => stats.pending = count,
            ContactStatus::InProgress => stats.in_progress = count,
            ContactStatus::Sent => stats.sent = count,
            ContactStatus::Failed => stats.failed = count,
        }
        stats.total += count;
    }
    Ok(stats)
}

/// Atomically claim the next pending contact using SELECT FOR UPDATE SKIP LOCKED.
/// Test contacts (serial 0) go first, then import order. The returned contact carries a
/// fresh `claim_id` that later writes must present.
pub async fn claim_next(pool: &PgPool) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        "UPDATE contacts
         SET status = 'in_progress', claim_id = $1, attempts = attempts + 1,
             last_attempt_at = now(), updated_at = now()
         WHERE id = (
             SELECT id FROM contacts
             WHERE status = 'pending'
             ORDER BY serial_number ASC, created_at ASC, id ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED
         )
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .fetch_optional(pool)
    .await
}

/// Hand a claimed contact back without recording an attempt.
pub async fn release(pool: &PgPool, id: Uuid, claim_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE contacts
         SET status = 'pending', claim_id = NULL,
             attempts = GREATEST(attempts - 1, 0), updated_at = now()
         WHERE id = $1 AND claim_id = $2 AND status = 'in_progress'",
    )
    .bind(id)
    .bind(claim_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Return claims abandoned by a crashed worker to the pending pool.
pub async fn release_stale(pool: &PgPool, older_than: Duration) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE contacts
         SET status = 'pending', claim_id = NULL, updated_at = now()
         WHERE status = 'in_progress'
           AND last_attempt_at <= now() - make_interval(secs => $1::double precision)",
    )
    .bind(older_than.as_secs_f64())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// The claim was still held and the contact now reflects the outcome.
    Claimed,
    /// The claim had been swept before the outcome arrived. A delivery is still recorded
    /// and marks the contact sent; a failure is only logged as an attempt.
    ClaimLost,
}

/// Write the result of a send back onto the contact and append it to the attempt log,
/// in one transaction.
pub async fn record_outcome(
    pool: &PgPool,
    id: Uuid,
    claim_id: Uuid,
    outcome: &SendOutcome,
) -> Result<Recorded, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = match outcome {
        SendOutcome::Sent { .. } => {
            sqlx::query(
                "UPDATE contacts
                 SET status = 'sent', claim_id = NULL, last_error = NULL,
                     sent_at = now(), updated_at = now()
                 WHERE id = $1 AND claim_id = $2",
            )
            .bind(id)
            .bind(claim_id)
            .execute(&mut *tx)
            .await?
        }
        SendOutcome::Failed { error, .. } => {
            sqlx::query(
                "UPDATE contacts
                 SET status = 'failed', claim_id = NULL, last_error = $3, updated_at = now()
                 WHERE id = $1 AND claim_id = $2",
            )
            .bind(id)
            .bind(claim_id)
            .bind(error)
            .execute(&mut *tx)
            .await?
        }
    };

    let recorded = if updated.rows_affected() > 0 {
        Recorded::Claimed
    } else {
        if outcome.is_sent() {
            // The email is out; never let it be claimed and delivered again.
            sqlx::query(
                "UPDATE contacts
                 SET status = 'sent', claim_id = NULL, last_error = NULL,
                     sent_at = COALESCE(sent_at, now()), updated_at = now()
                 WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        Recorded::ClaimLost
    };

    let (label, subject, error) = match outcome {
        SendOutcome::Sent { subject } => ("sent", Some(subject.as_str()), None),
        SendOutcome::Failed { subject, error } => ("failed", subject.as_deref(), Some(error.as_str())),
    };

    sqlx::query(
        "INSERT INTO send_attempts (contact_id, outcome, subject, error)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(label)
    .bind(subject)
    .bind(error)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(recorded)
}

/// Put a failed contact back in the queue.
pub async fn retry(pool: &PgPool, id: Uuid) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        "UPDATE contacts
         SET status = 'pending', last_error = NULL, updated_at = now()
         WHERE id = $1 AND status = 'failed'
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn retry_all_failed(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE contacts
         SET status = 'pending', last_error = NULL, updated_at = now()
         WHERE status = 'failed'",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
