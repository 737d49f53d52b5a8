use std::sync::Arc;

use sqlx::PgPool;

use crate::campaign::Campaign;
use crate::config::Config;
use crate::generator::EmailGenerator;
use crate::mailer::Mailer;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub campaign: Campaign,
    pub generator: Arc<dyn EmailGenerator>,
    pub mailer: Arc<dyn Mailer>,
}
