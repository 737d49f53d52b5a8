pub mod campaign;
pub mod emails;
pub mod resume;

use axum::Router;
use axum::routing::{get, post};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Campaign control
        .route("/api/v1/stats", get(campaign::stats))
        .route("/api/v1/start-campaign", post(campaign::start))
        .route("/api/v1/pause-campaign", post(campaign::pause))
        .route("/api/v1/resume-campaign", post(campaign::resume))
        .route("/api/v1/stop-campaign", post(campaign::stop))
        // Contacts
        .route("/api/v1/emails/pending", get(emails::list_pending))
        .route("/api/v1/emails/sent", get(emails::list_sent))
        .route("/api/v1/emails/failed", get(emails::list_failed))
        .route("/api/v1/emails/upload", post(emails::upload))
        .route("/api/v1/emails/retry-all-failed", post(emails::retry_all_failed))
        .route("/api/v1/emails/retry/{id}", post(emails::retry))
        .route("/api/v1/emails/{id}", get(emails::get))
        .route("/api/v1/emails/{id}/attempts", get(emails::attempts))
        // Resume attachment
        .route("/api/v1/resume", get(resume::get).put(resume::upload))
}
