use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use outreach::config::{
    ApplicantProfile, CampaignConfig, Config, GeneratorConfig, SmtpConfig, TlsMode,
};
use outreach::generator::{EmailGenerator, GeneratedEmail, GenerationError};
use outreach::mailer::{MailError, Mailer, OutgoingEmail};
use outreach::models::Contact;
use outreach::state::SharedState;

/// Drafts a fixed email, or fails for the configured addresses.
#[derive(Default)]
pub struct FakeGenerator {
    pub fail_for: HashSet<String>,
}

#[async_trait]
impl EmailGenerator for FakeGenerator {
    async fn generate(&self, contact: &Contact) -> Result<GeneratedEmail, GenerationError> {
        if self.fail_for.contains(&contact.email) {
            return Err(GenerationError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            });
        }
        Ok(GeneratedEmail {
            subject: format!("Hello {}", contact.company.as_deref().unwrap_or("there")),
            body: format!("Hi {},\n\nPlease find my resume attached.", contact.name),
        })
    }
}

/// Records every message instead of sending it.
///
/// With a gate set, each send signals `entered` and then blocks until the test opens the gate.
#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub fail_for: HashSet<String>,
    pub gate: Option<Arc<Notify>>,
    pub entered: Notify,
}

impl FakeMailer {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        if self.fail_for.contains(&email.to) {
            return Err(MailError::Permanent("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct TestOptions {
    pub daily_cap: u32,
    pub api_token: Option<String>,
    pub generator: FakeGenerator,
    pub mailer: FakeMailer,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            daily_cap: 50,
            api_token: None,
            generator: FakeGenerator::default(),
            mailer: FakeMailer::default(),
        }
    }
}

/// A running test server instance with a dedicated test database and campaign worker.
pub struct TestApp {
    pub addr: std::net::SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    pub state: SharedState,
    pub mailer: Arc<FakeMailer>,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Upload contacts as a JSON array.
    pub async fn upload_json(&self, contacts: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/emails/upload"))
            .json(contacts)
            .send()
            .await
            .expect("upload request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Upload contacts with an explicit content type.
    pub async fn upload_raw(&self, content_type: &str, body: impl Into<reqwest::Body>) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/emails/upload"))
            .header("content-type", content_type)
            .body(body)
            .send()
            .await
            .expect("upload request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Upload `count` contacts with serial numbers 1..=count.
    pub async fn seed_contacts(&self, count: usize) {
        let contacts: Vec<Value> = (1..=count)
            .map(|i| {
                json!({
                    "serial_number": i,
                    "name": format!("Recruiter {i}"),
                    "email": format!("recruiter{i}@company{i}.test"),
                    "title": "HR Manager",
                    "company": format!("Company {i}"),
                })
            })
            .collect();
        let (body, status) = self.upload_json(&json!(contacts)).await;
        assert_eq!(status, StatusCode::OK, "seed upload failed: {body}");
    }

    pub async fn stats(&self) -> Value {
        let (body, status) = self.get("/api/v1/stats").await;
        assert_eq!(status, StatusCode::OK, "stats failed: {body}");
        body
    }

    /// Poll the stats endpoint until `done` holds, failing the test after ten seconds.
    pub async fn wait_for_stats(&self, what: &str, done: impl Fn(&Value) -> bool) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let stats = self.stats().await;
            if done(&stats) {
                return stats;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}; last stats: {stats}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    pub async fn contact_id(&self, email: &str) -> Uuid {
        sqlx::query_scalar("SELECT id FROM contacts WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .expect("contact not found")
    }
}

pub fn test_config(database_url: String, options: &TestOptions) -> Config {
    Config {
        database_url,
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        max_body_size: 1_048_576,
        api_token: options.api_token.clone(),
        log_level: "warn".to_string(),
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: "jane@example.com".to_string(),
            pass: "unused".to_string(),
            from_name: Some("Jane Doe".to_string()),
            tls_mode: TlsMode::None,
        },
        operator_email: "jane@example.com".to_string(),
        generator: GeneratorConfig {
            api_key: None,
            model: "unused".to_string(),
        },
        profile: ApplicantProfile {
            name: "Jane Doe".to_string(),
            role: "Software Developer".to_string(),
            ..ApplicantProfile::default()
        },
        resume_path: None,
        campaign: CampaignConfig {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            daily_cap: options.daily_cap,
            ..CampaignConfig::default()
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(TestOptions::default()).await
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app_with(options: TestOptions) -> TestApp {
    let (pool, db_name, test_url) = create_test_db().await;

    let config = test_config(test_url, &options);
    let mailer = Arc::new(options.mailer);
    let (app, state) = outreach::build_app_with(
        pool.clone(),
        config,
        Arc::new(options.generator),
        mailer.clone(),
    );

    let (shutdown, shutdown_rx) = watch::channel(false);
    let worker = outreach::worker::spawn(state.clone(), shutdown_rx);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        pool,
        client: Client::new(),
        db_name,
        state,
        mailer,
        shutdown,
        worker,
    }
}

/// Create a uniquely named database with migrations applied.
pub async fn create_test_db() -> (PgPool, String, String) {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let db_name = format!("outreach_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    (pool, db_name, test_url)
}

fn admin_url(base_url: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.to_string())
}

/// Stop the worker and drop the test database.
pub async fn cleanup(app: TestApp) {
    let _ = app.shutdown.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(5), app.worker).await;
    drop_test_db(app.pool, &app.db_name).await;
}

pub async fn drop_test_db(pool: PgPool, db_name: &str) {
    pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
