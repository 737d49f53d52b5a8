use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::campaign::CampaignStatus;
use crate::campaign::schedule::{self, DailyWindow};
use crate::db;
use crate::db::contacts::Recorded;
use crate::mailer::{self, Attachment, OutgoingEmail};
use crate::models::{Contact, SendOutcome};
use crate::state::{AppState, SharedState};

/// What one pass of the loop did, and therefore how long to wait before the next.
#[derive(Debug)]
enum Step {
    Processed,
    /// Claimed a contact but the campaign was paused or stopped meanwhile.
    Released,
    DailyCapReached { until: DateTime<Utc> },
    Drained,
}

/// Spawn the single campaign worker. It idles until the campaign is started and exits
/// when `shutdown` flips to true.
pub fn spawn(state: SharedState, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(run(state, shutdown))
}

async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut status = state.campaign.subscribe();
    tracing::info!("Campaign worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        if *status.borrow_and_update() != CampaignStatus::Running {
            tokio::select! {
                changed = status.changed() => if changed.is_err() { break },
                changed = shutdown.changed() => if changed.is_err() { break },
            }
            continue;
        }

        match process_next(&state).await {
            Ok(Step::Processed) => {
                let config = &state.config.campaign;
                let delay = schedule::random_delay(config.min_delay, config.max_delay);
                tracing::info!("Next send in {}s", delay.as_secs());
                sleep_while_running(delay, &mut status, &mut shutdown).await;
            }
            Ok(Step::Released) => {}
            Ok(Step::DailyCapReached { until }) => {
                tracing::info!(
                    "Daily cap of {} reached, holding sends until {until}",
                    state.campaign.daily_cap()
                );
                state.campaign.set_waiting_until(Some(until));
                let wait = (until - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                sleep_while_running(wait, &mut status, &mut shutdown).await;
                state.campaign.set_waiting_until(None);
            }
            Ok(Step::Drained) => {
                if state.campaign.finish() {
                    tracing::info!("No pending contacts left, campaign finished");
                }
            }
            Err(e) => {
                tracing::error!("Campaign halted, store unavailable: {e}");
                state.campaign.halt(format!("Store unavailable: {e}"));
            }
        }
    }

    tracing::info!("Campaign worker stopped");
}

/// Wait out `duration`, returning early as soon as the campaign leaves Running or the
/// process is shutting down.
async fn sleep_while_running(
    duration: Duration,
    status: &mut watch::Receiver<CampaignStatus>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let deadline = tokio::time::Instant::now() + duration;

    loop {
        if *status.borrow_and_update() != CampaignStatus::Running || *shutdown.borrow() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return,
            changed = status.changed() => if changed.is_err() { return },
            _ = shutdown.changed() => return,
        }
    }
}

/// Check the daily cap, claim the next contact and run it through generation and delivery.
/// Only store errors escape; everything that goes wrong with the contact itself is recorded on it.
async fn process_next(state: &AppState) -> Result<Step, sqlx::Error> {
    let config = &state.config.campaign;

    let window = DailyWindow::containing(Utc::now(), config.daily_reset);
    let sent_today = db::send_attempts::count_sent_since(&state.pool, window.start).await?;
    state.campaign.set_sent_today(sent_today);
    if sent_today >= i64::from(state.campaign.daily_cap()) {
        return Ok(Step::DailyCapReached { until: window.end });
    }

    let released = db::contacts::release_stale(&state.pool, config.stale_claim_after).await?;
    if released > 0 {
        tracing::warn!("Returned {released} abandoned claim(s) to the pending pool");
    }

    let Some(contact) = db::contacts::claim_next(&state.pool).await? else {
        return Ok(Step::Drained);
    };
    let Some(claim_id) = contact.claim_id else {
        return Err(sqlx::Error::Protocol(format!(
            "claimed contact {} has no claim id",
            contact.id
        )));
    };

    if !state.campaign.is_running() {
        db::contacts::release(&state.pool, contact.id, claim_id).await?;
        return Ok(Step::Released);
    }

    tracing::info!(
        "Processing {} <{}> (attempt {})",
        contact.name,
        contact.email,
        contact.attempts
    );

    state.campaign.set_current(Some(contact.email.clone()));
    let outcome = deliver(state, &contact).await;
    state.campaign.set_current(None);
    let outcome = outcome?;

    match &outcome {
        SendOutcome::Sent { subject } => {
            tracing::info!("Sent to {}: {subject}", contact.email)
        }
        SendOutcome::Failed { error, .. } => {
            tracing::warn!("Failed to send to {}: {error}", contact.email)
        }
    }

    let recorded = db::contacts::record_outcome(&state.pool, contact.id, claim_id, &outcome).await?;
    if recorded == Recorded::ClaimLost {
        tracing::warn!(
            "Claim on {} was swept while sending; outcome recorded anyway",
            contact.email
        );
    }
    if outcome.is_sent() {
        state.campaign.record_sent();
    }

    Ok(Step::Processed)
}

async fn deliver(state: &AppState, contact: &Contact) -> Result<SendOutcome, sqlx::Error> {
    let draft = match state.generator.generate(contact).await {
        Ok(draft) => draft,
        Err(e) => {
            return Ok(SendOutcome::Failed {
                subject: None,
                error: format!("Generation failed: {e}"),
            });
        }
    };

    let email = OutgoingEmail {
        to: contact.email.clone(),
        subject: draft.subject.clone(),
        body: draft.body,
        attachment: load_resume(state).await?,
        reply_to: state.config.operator_email.clone(),
        bcc: state.config.operator_email.clone(),
    };

    Ok(match state.mailer.send(&email).await {
        Ok(()) => SendOutcome::Sent {
            subject: draft.subject,
        },
        Err(e) => SendOutcome::Failed {
            subject: Some(draft.subject),
            error: e.to_string(),
        },
    })
}

/// The uploaded resume wins over the configured file. Without either, mail goes out bare.
async fn load_resume(state: &AppState) -> Result<Option<Attachment>, sqlx::Error> {
    if let Some(resume) = db::resumes::find_active(&state.pool).await? {
        return Ok(Some(Attachment {
            filename: resume.filename,
            content_type: resume.content_type,
            data: resume.content,
        }));
    }

    let Some(path) = &state.config.resume_path else {
        tracing::warn!("No resume uploaded or configured, sending without attachment");
        return Ok(None);
    };

    match tokio::fs::read(path).await {
        Ok(data) => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "resume.pdf".to_string());
            Ok(Some(Attachment {
                content_type: mailer::guess_content_type(&filename).to_string(),
                filename,
                data,
            }))
        }
        Err(e) => {
            tracing::warn!(
                "Could not read resume at {}: {e}; sending without attachment",
                path.display()
            );
            Ok(None)
        }
    }
}
