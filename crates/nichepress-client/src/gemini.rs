use std::time::Duration;

use nichepress_core::error::AppError;
use nichepress_core::traits::LanguageModel;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_client, send_error, snippet};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Gemini REST client (`generateContent` and `models`).
///
/// Stateless with respect to keys: each call authenticates with the key it
/// is handed through the `x-goog-api-key` header.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Self::build(base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.base_url, timeout)
    }

    fn build(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

// ---- Gemini API types ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn generate_request<'a>(system: Option<&'a str>, prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: system.map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        }),
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: prompt }],
        }],
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    (!text.is_empty()).then_some(text)
}

/// Models that support `generateContent`, without the `models/` prefix.
fn generation_models(list: ModelList) -> Vec<String> {
    list.models
        .into_iter()
        .filter(|m| {
            m.supported_generation_methods
                .iter()
                .any(|g| g == "generateContent")
        })
        .map(|m| m.name.trim_start_matches("models/").to_string())
        .collect()
}

/// Error message from a failed response, keeping Google's status name
/// (e.g. `RESOURCE_EXHAUSTED`) so quota classification can see it.
fn error_message(status_code: u16, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(e) => match e.error.status {
            Some(status) => format!("{status}: {}", e.error.message),
            None => e.error.message,
        },
        Err(_) => format!("HTTP {status_code}: {}", snippet(body)),
    }
}

impl GeminiClient {
    async fn checked(&self, response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::LlmError {
            message: error_message(status_code, &body),
            status_code,
        })
    }
}

impl LanguageModel for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String, AppError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&generate_request(system, prompt))
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let body: GenerateResponse = self
            .checked(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {e}")))?;

        response_text(body).ok_or_else(|| AppError::LlmError {
            message: format!("Empty response from {model}"),
            status_code: 200,
        })
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let list: ModelList = self
            .checked(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse model list: {e}")))?;

        Ok(generation_models(list))
    }
}
