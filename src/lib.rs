pub mod campaign;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod import;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use sqlx::PgPool;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::campaign::Campaign;
use crate::config::Config;
use crate::generator::{EmailGenerator, GeminiGenerator, TemplateGenerator};
use crate::mailer::{Mailer, SmtpMailer};
use crate::middleware::api_token::require_api_token;
use crate::state::{AppState, SharedState};

/// Build the router with the real SMTP mailer and whichever generator the config asks for.
pub fn build_app(pool: PgPool, config: Config) -> Result<(Router, SharedState), String> {
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(&config.smtp)?);

    let generator: Arc<dyn EmailGenerator> = match &config.generator.api_key {
        Some(api_key) => {
            tracing::info!("Drafting emails with Gemini model {}", config.generator.model);
            Arc::new(
                GeminiGenerator::new(
                    api_key.clone(),
                    config.generator.model.clone(),
                    config.profile.clone(),
                )
                .map_err(|e| format!("Failed to build Gemini client: {e}"))?,
            )
        }
        None => {
            tracing::warn!("OUTREACH_GEMINI_API_KEY not set, using the fixed email template");
            Arc::new(TemplateGenerator::new(config.profile.clone()))
        }
    };

    Ok(build_app_with(pool, config, generator, mailer))
}

pub fn build_app_with(
    pool: PgPool,
    config: Config,
    generator: Arc<dyn EmailGenerator>,
    mailer: Arc<dyn Mailer>,
) -> (Router, SharedState) {
    let max_body_size = config.max_body_size;

    let state: SharedState = Arc::new(AppState {
        pool,
        campaign: Campaign::new(config.campaign.daily_cap),
        config,
        generator,
        mailer,
    });

    let api = routes::api_routes().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        require_api_token,
    ));

    let app = Router::new()
        .merge(api)
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("no-referrer"),
        ))
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
