use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmailGenerator, GeneratedEmail, GenerationError, parse_draft, prompts};
use crate::config::ApplicantProfile;
use crate::models::Contact;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_ATTEMPTS: u32 = 3;
const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Drafts outreach emails with Google's Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    profile: ApplicantProfile,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String, profile: ApplicantProfile) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
            profile,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Retries 429 and 5xx responses with exponential backoff; other failures return at once.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let mut last_error = GenerationError::Empty;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(
                    "Gemini attempt {attempt} failed ({last_error}), retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = GenerationError::Http(e);
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = GenerationError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                };
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            let body = response.text().await?;
            let parsed: GenerateResponse =
                serde_json::from_str(&body).map_err(|e| GenerationError::Parse(e.to_string()))?;

            return parsed.text().ok_or(GenerationError::Empty);
        }

        Err(last_error)
    }
}

fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[async_trait]
impl EmailGenerator for GeminiGenerator {
    async fn generate(&self, contact: &Contact) -> Result<GeneratedEmail, GenerationError> {
        let prompt = prompts::draft_prompt(&self.profile, contact);
        let text = self.complete(&prompt).await?;
        let draft = parse_draft(&text)?;
        tracing::debug!("Drafted email for {}: {}", contact.email, draft.subject);
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use chrono::Utc;
    use serde_json::{Value, json};

    use crate::models::ContactStatus;

    const API_KEY: &str = "test-key";

    struct Stub {
        hits: AtomicUsize,
        replies: Vec<(StatusCode, Value)>,
    }

    async fn reply(State(stub): State<Arc<Stub>>, headers: HeaderMap) -> (StatusCode, axum::Json<Value>) {
        if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
            return (StatusCode::UNAUTHORIZED, axum::Json(json!({})));
        }
        let n = stub.hits.fetch_add(1, Ordering::SeqCst);
        let (status, body) = stub.replies[n.min(stub.replies.len() - 1)].clone();
        (status, axum::Json(body))
    }

    /// Serve `replies` in order (the last one repeats) and return a generator pointed at them.
    async fn generator_against(replies: Vec<(StatusCode, Value)>) -> (GeminiGenerator, Arc<Stub>) {
        let stub = Arc::new(Stub {
            hits: AtomicUsize::new(0),
            replies,
        });
        let app = Router::new()
            .route("/models/{call}", post(reply))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let generator = GeminiGenerator::new(
            API_KEY.to_string(),
            "gemini-test".to_string(),
            ApplicantProfile {
                name: "Jane Doe".into(),
                role: "Software Developer".into(),
                ..ApplicantProfile::default()
            },
        )
        .unwrap()
        .with_base_url(format!("http://{addr}"));
        (generator, stub)
    }

    fn contact() -> Contact {
        Contact {
            id: uuid::Uuid::now_v7(),
            serial_number: 1,
            name: "Priya Sharma".into(),
            email: "priya@acme.test".into(),
            title: None,
            company: Some("Acme".into()),
            status: ContactStatus::InProgress,
            claim_id: None,
            attempts: 1,
            last_error: None,
            last_attempt_at: None,
            sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn draft(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }] })
    }

    #[tokio::test]
    async fn rate_limited_call_is_retried() {
        let (generator, stub) = generator_against(vec![
            (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": { "code": 429, "message": "Quota exceeded" } }),
            ),
            (StatusCode::OK, draft("SUBJECT: Hello Acme\nBODY:\nHi Priya")),
        ])
        .await;

        let email = generator.generate(&contact()).await.unwrap();
        assert_eq!(email.subject, "Hello Acme");
        assert_eq!(email.body, "Hi Priya");
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let (generator, stub) = generator_against(vec![(
            StatusCode::BAD_REQUEST,
            json!({ "error": { "code": 400, "message": "API key not valid" } }),
        )])
        .await;

        match generator.generate(&contact()).await {
            Err(GenerationError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected API error, got {other:?}"),
        }
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocked_prompt_is_empty() {
        let (generator, stub) = generator_against(vec![(
            StatusCode::OK,
            json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
        )])
        .await;

        assert!(matches!(
            generator.generate(&contact()).await,
            Err(GenerationError::Empty)
        ));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reply_without_markers_is_malformed() {
        let (generator, _) =
            generator_against(vec![(StatusCode::OK, draft("Dear hiring manager, ..."))]).await;

        assert!(matches!(
            generator.generate(&contact()).await,
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn extracts_text_from_first_candidate() {
        let body = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "SUBJECT: Hi\n"}, {"text": "BODY:\nHello"}]}, "finishReason": "STOP"}
            ],
            "usageMetadata": {"promptTokenCount": 10}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("SUBJECT: Hi\nBODY:\nHello"));
    }

    #[test]
    fn blocked_prompt_has_no_text() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn api_error_message_prefers_structured_body() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(api_error_message(body.to_string()), "Quota exceeded");
        assert_eq!(api_error_message("gateway timeout".to_string()), "gateway timeout");
    }
}
