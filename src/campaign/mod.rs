pub mod schedule;

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignStatus::Idle => "idle",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CampaignError {
    InvalidTransition {
        from: CampaignStatus,
        action: &'static str,
    },
    NothingToSend,
}

impl std::fmt::Display for CampaignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignError::InvalidTransition { from, action } => {
                write!(f, "Cannot {action} a campaign that is {from}")
            }
            CampaignError::NothingToSend => write!(f, "Nothing to send: no pending contacts"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignSnapshot {
    pub status: CampaignStatus,
    pub daily_cap: u32,
    pub sent_today: i64,
    pub current_email: Option<String>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Set while the worker sits out the rest of a capped day.
    pub waiting_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Progress {
    sent_today: i64,
    current_email: Option<String>,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    waiting_until: Option<DateTime<Utc>>,
}

/// Process-wide campaign state, shared by the worker and the control API.
///
/// The run status lives in a watch channel so the worker wakes up as soon as it changes;
/// everything else is bookkeeping for the stats endpoint.
pub struct Campaign {
    status: watch::Sender<CampaignStatus>,
    progress: Mutex<Progress>,
    daily_cap: u32,
}

impl Campaign {
    pub fn new(daily_cap: u32) -> Self {
        let (status, _) = watch::channel(CampaignStatus::Idle);
        Self {
            status,
            progress: Mutex::new(Progress::default()),
            daily_cap,
        }
    }

    pub fn status(&self) -> CampaignStatus {
        *self.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == CampaignStatus::Running
    }

    pub fn daily_cap(&self) -> u32 {
        self.daily_cap
    }

    pub fn subscribe(&self) -> watch::Receiver<CampaignStatus> {
        self.status.subscribe()
    }

    /// Idle/Stopped -> Running. `pending` is the number of contacts waiting to be sent.
    pub fn start(&self, pending: i64) -> Result<CampaignStatus, CampaignError> {
        let next = self.transition("start", |from| match from {
            CampaignStatus::Idle | CampaignStatus::Stopped if pending > 0 => {
                Ok(CampaignStatus::Running)
            }
            CampaignStatus::Idle | CampaignStatus::Stopped => Err(CampaignError::NothingToSend),
            _ => Err(CampaignError::InvalidTransition {
                from,
                action: "start",
            }),
        })?;

        let mut progress = self.progress();
        progress.last_error = None;
        progress.waiting_until = None;
        progress.started_at = Some(Utc::now());
        Ok(next)
    }

    pub fn pause(&self) -> Result<CampaignStatus, CampaignError> {
        self.transition("pause", |from| match from {
            CampaignStatus::Running => Ok(CampaignStatus::Paused),
            _ => Err(CampaignError::InvalidTransition {
                from,
                action: "pause",
            }),
        })
    }

    pub fn resume(&self) -> Result<CampaignStatus, CampaignError> {
        self.transition("resume", |from| match from {
            CampaignStatus::Paused => Ok(CampaignStatus::Running),
            _ => Err(CampaignError::InvalidTransition {
                from,
                action: "resume",
            }),
        })
    }

    pub fn stop(&self) -> Result<CampaignStatus, CampaignError> {
        let next = self.transition("stop", |from| match from {
            CampaignStatus::Running | CampaignStatus::Paused => Ok(CampaignStatus::Stopped),
            _ => Err(CampaignError::InvalidTransition {
                from,
                action: "stop",
            }),
        })?;
        self.progress().waiting_until = None;
        Ok(next)
    }

    /// Running -> Stopped once the queue has drained. Returns false if the campaign had
    /// already left Running.
    pub fn finish(&self) -> bool {
        let finished = self
            .transition("finish", |from| match from {
                CampaignStatus::Running => Ok(CampaignStatus::Stopped),
                _ => Err(CampaignError::InvalidTransition {
                    from,
                    action: "finish",
                }),
            })
            .is_ok();
        if finished {
            self.progress().waiting_until = None;
        }
        finished
    }

    /// Stop the campaign because the store failed; the error stays visible until the next start.
    pub fn halt(&self, error: String) {
        let _ = self.transition("halt", |from| match from {
            CampaignStatus::Running | CampaignStatus::Paused => Ok(CampaignStatus::Stopped),
            _ => Err(CampaignError::InvalidTransition {
                from,
                action: "halt",
            }),
        });
        let mut progress = self.progress();
        progress.last_error = Some(error);
        progress.current_email = None;
        progress.waiting_until = None;
    }

    pub fn set_current(&self, email: Option<String>) {
        self.progress().current_email = email;
    }

    pub fn set_sent_today(&self, count: i64) {
        self.progress().sent_today = count;
    }

    pub fn record_sent(&self) {
        self.progress().sent_today += 1;
    }

    pub fn set_waiting_until(&self, until: Option<DateTime<Utc>>) {
        self.progress().waiting_until = until;
    }

    pub fn snapshot(&self) -> CampaignSnapshot {
        let status = self.status();
        let progress = self.progress();
        CampaignSnapshot {
            status,
            daily_cap: self.daily_cap,
            sent_today: progress.sent_today,
            current_email: progress.current_email.clone(),
            last_error: progress.last_error.clone(),
            started_at: progress.started_at,
            waiting_until: progress.waiting_until,
        }
    }

    fn transition(
        &self,
        action: &'static str,
        next: impl FnOnce(CampaignStatus) -> Result<CampaignStatus, CampaignError>,
    ) -> Result<CampaignStatus, CampaignError> {
        let mut result = Err(CampaignError::InvalidTransition {
            from: self.status(),
            action,
        });
        self.status.send_if_modified(|current| match next(*current) {
            Ok(to) => {
                tracing::info!("Campaign {action}: {current} -> {to}");
                *current = to;
                result = Ok(to);
                true
            }
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
