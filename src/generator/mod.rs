pub mod gemini;
pub mod prompts;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ApplicantProfile;
use crate::models::Contact;

pub use gemini::GeminiGenerator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Debug)]
pub enum GenerationError {
    Http(reqwest::Error),
    Api { status: u16, message: String },
    Parse(String),
    Empty,
    Malformed(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Http(err) => write!(f, "HTTP error: {err}"),
            GenerationError::Api { status, message } => {
                write!(f, "API error (status {status}): {message}")
            }
            GenerationError::Parse(msg) => write!(f, "Invalid API response: {msg}"),
            GenerationError::Empty => write!(f, "Model returned no text"),
            GenerationError::Malformed(msg) => write!(f, "Malformed email draft: {msg}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Http(err)
    }
}

/// Writes the subject and body for one contact.
#[async_trait]
pub trait EmailGenerator: Send + Sync {
    async fn generate(&self, contact: &Contact) -> Result<GeneratedEmail, GenerationError>;
}

/// Fixed template used when no model API key is configured.
pub struct TemplateGenerator {
    profile: ApplicantProfile,
}

impl TemplateGenerator {
    pub fn new(profile: ApplicantProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl EmailGenerator for TemplateGenerator {
    async fn generate(&self, contact: &Contact) -> Result<GeneratedEmail, GenerationError> {
        let company = prompts::company_or_default(contact);
        Ok(GeneratedEmail {
            subject: prompts::default_subject(&self.profile, company),
            body: prompts::template_body(&self.profile, contact),
        })
    }
}

/// Split a model reply of the form `SUBJECT: ... BODY: ...` into its parts.
pub fn parse_draft(text: &str) -> Result<GeneratedEmail, GenerationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::Empty);
    }

    let (head, body) = text
        .split_once("BODY:")
        .ok_or_else(|| GenerationError::Malformed("missing BODY: section".to_string()))?;

    let subject = head
        .split_once("SUBJECT:")
        .map(|(_, s)| s)
        .ok_or_else(|| GenerationError::Malformed("missing SUBJECT: line".to_string()))?
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| c == '*' || c == '"')
        .trim()
        .to_string();

    let body = body.trim().to_string();

    if subject.is_empty() {
        return Err(GenerationError::Malformed("empty subject".to_string()));
    }
    if body.is_empty() {
        return Err(GenerationError::Malformed("empty body".to_string()));
    }

    Ok(GeneratedEmail { subject, body })
}
