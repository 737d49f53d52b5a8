use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub api_token: Option<String>,
    pub log_level: String,
    pub smtp: SmtpConfig,
    /// Receives Reply-To and a blind copy of every outgoing message.
    pub operator_email: String,
    pub generator: GeneratorConfig,
    pub profile: ApplicantProfile,
    pub resume_path: Option<PathBuf>,
    pub campaign: CampaignConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_name: Option<String>,
    pub tls_mode: TlsMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TlsMode {
    StartTls,
    Tls,
    None,
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub model: String,
}

/// Who the outreach emails are written on behalf of.
#[derive(Debug, Clone, Default)]
pub struct ApplicantProfile {
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub skills: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub highlights: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CampaignConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub daily_cap: u32,
    /// Time of day (UTC) at which the daily send counter starts over.
    pub daily_reset: NaiveTime,
    /// Claims older than this are considered abandoned by a crashed worker.
    pub stale_claim_after: Duration,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(600),
            max_delay: Duration::from_secs(1800),
            daily_cap: 50,
            daily_reset: NaiveTime::MIN,
            stale_claim_after: Duration::from_secs(900),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let host: IpAddr = env_or("OUTREACH_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid OUTREACH_HOST: {e}"))?;

        let port: u16 = env_or("OUTREACH_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid OUTREACH_PORT: {e}"))?;

        // Resume uploads go through the API, so the default leaves room for a PDF.
        let max_body_size: usize = env_or("OUTREACH_MAX_BODY_SIZE", "10485760")
            .parse()
            .map_err(|e| format!("Invalid OUTREACH_MAX_BODY_SIZE: {e}"))?;

        let api_token = env_optional("OUTREACH_API_TOKEN");
        let log_level = env_or("OUTREACH_LOG_LEVEL", "info");

        let tls_mode = match env_or("OUTREACH_SMTP_TLS", "starttls").as_str() {
            "starttls" => TlsMode::StartTls,
            "tls" => TlsMode::Tls,
            "none" => TlsMode::None,
            other => return Err(format!("Invalid OUTREACH_SMTP_TLS: {other}")),
        };

        let smtp = SmtpConfig {
            host: env_or("OUTREACH_SMTP_HOST", "smtp.gmail.com"),
            port: env_or("OUTREACH_SMTP_PORT", "587")
                .parse()
                .map_err(|e| format!("Invalid OUTREACH_SMTP_PORT: {e}"))?,
            user: env_required("OUTREACH_SMTP_USER")?,
            pass: env_required("OUTREACH_SMTP_PASS")?,
            from_name: env_optional("OUTREACH_SENDER_NAME"),
            tls_mode,
        };

        let operator_email =
            env_optional("OUTREACH_OPERATOR_EMAIL").unwrap_or_else(|| smtp.user.clone());

        let generator = GeneratorConfig {
            api_key: env_optional("OUTREACH_GEMINI_API_KEY"),
            model: env_or("OUTREACH_GEMINI_MODEL", "gemini-1.5-flash"),
        };

        let profile = ApplicantProfile {
            name: smtp.from_name.clone().unwrap_or_default(),
            role: env_or("OUTREACH_APPLICANT_ROLE", "Software Developer"),
            phone: env_optional("OUTREACH_SENDER_PHONE"),
            linkedin: env_optional("OUTREACH_SENDER_LINKEDIN"),
            github: env_optional("OUTREACH_SENDER_GITHUB"),
            skills: env_optional("OUTREACH_APPLICANT_SKILLS"),
            experience: env_optional("OUTREACH_APPLICANT_EXPERIENCE"),
            education: env_optional("OUTREACH_APPLICANT_EDUCATION"),
            highlights: env_optional("OUTREACH_APPLICANT_HIGHLIGHTS"),
        };

        let resume_path = env_optional("OUTREACH_RESUME_PATH").map(PathBuf::from);

        let campaign = CampaignConfig {
            min_delay: Duration::from_secs(env_parse("OUTREACH_MIN_DELAY_SECS", "600")?),
            max_delay: Duration::from_secs(env_parse("OUTREACH_MAX_DELAY_SECS", "1800")?),
            daily_cap: env_parse("OUTREACH_DAILY_CAP", "50")?,
            daily_reset: NaiveTime::parse_from_str(&env_or("OUTREACH_DAILY_RESET_UTC", "00:00"), "%H:%M")
                .map_err(|e| format!("Invalid OUTREACH_DAILY_RESET_UTC (expected HH:MM): {e}"))?,
            stale_claim_after: Duration::from_secs(env_parse("OUTREACH_STALE_CLAIM_SECS", "900")?),
        };
        campaign.validate()?;

        Ok(Config {
            database_url,
            host,
            port,
            max_body_size,
            api_token,
            log_level,
            smtp,
            operator_email,
            generator,
            profile,
            resume_path,
            campaign,
        })
    }
}

impl CampaignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_delay > self.max_delay {
            return Err(format!(
                "OUTREACH_MIN_DELAY_SECS ({}) must not exceed OUTREACH_MAX_DELAY_SECS ({})",
                self.min_delay.as_secs(),
                self.max_delay.as_secs()
            ));
        }
        if self.daily_cap == 0 {
            return Err("OUTREACH_DAILY_CAP must be at least 1".to_string());
        }
        Ok(())
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}
