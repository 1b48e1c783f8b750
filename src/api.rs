//! Language-model API access.
//!
//! - [`ModelBackend`]: the seam the extractor talks to
//! - [`GeminiClient`]: Google Gemini `generateContent` with schema-constrained
//!   JSON output
//!
//! One request per call. There is no retry or backoff here; callers pace
//! their own calls.

use crate::config::{ApiKey, Settings};
use crate::error::{ConfigError, ExtractionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// What the extractor sends to a model.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    /// JSON schema the output must follow.
    pub response_schema: &'a Value,
}

/// A model that answers a prompt with a JSON string.
pub trait ModelBackend {
    /// Send the prompt and return the raw JSON text produced by the model.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExtractionError>;
}

/// Client for the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(settings: &Settings, api_key: ApiKey) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.model_timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("model HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn request_body<'a>(request: GenerateRequest<'a>) -> GenerateContentBody<'a> {
    GenerateContentBody {
        contents: [Content {
            role: "user",
            parts: [Part {
                text: request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: request.response_schema,
        },
    }
}

/// Pull the generated JSON text out of a `generateContent` response body.
fn response_text(body: &str) -> Result<String, ExtractionError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ExtractionError::Api(format!("unexpected response body: {e}")))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ExtractionError::Api(format!("prompt blocked: {reason}")));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::Api("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
        return Err(ExtractionError::Api(format!("empty candidate (finish reason {reason})")));
    }
    Ok(text)
}

fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => {
            format!("HTTP {} {}: {}", status.as_u16(), parsed.error.status, parsed.error.message)
        }
        _ => format!("HTTP {}", status.as_u16()),
    }
}

impl ModelBackend for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ExtractionError> {
        let t0 = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| {
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
                ExtractionError::Network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !status.is_success() {
            let message = api_error_message(status, &body);
            warn!(elapsed_ms, %message, "API returned an error");
            return Err(ExtractionError::Api(message));
        }

        debug!(elapsed_ms, bytes = body.len(), "API call succeeded");
        response_text(&body)
    }
}
