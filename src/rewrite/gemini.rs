//! Gemini REST adapter.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use super::{RemoteError, RewriteClient, chunk_prompt};

const CONNECTION_PROBE: &str = "Say \"Connection successful\" if you can read this.";
const CONNECTION_PROBE_TOKENS: u32 = 100;
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Settings consumed by [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// API key appended as the `key` query parameter.
    pub api_key: String,
    /// Model identifier, e.g. `gemini-2.5-flash`.
    pub model: String,
    /// Base URL of the models endpoint.
    pub base_url: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap per request.
    pub max_output_tokens: u32,
    /// Optional system instruction.
    pub system_prompt: Option<String>,
    /// Retries allowed after HTTP 429.
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `retry_delay * 2^n`.
    pub retry_delay: Duration,
}

impl GeminiSettings {
    /// Derive client settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Ok(Self {
            api_key: config.require_api_key()?.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            system_prompt: Some(config.system_prompt.clone())
                .filter(|prompt| !prompt.trim().is_empty()),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }
}

/// Model entry returned by the models listing endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Fully qualified model name (`models/...`).
    pub name: String,
    /// Human-readable name, when provided.
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// HTTP client for Gemini `generateContent`.
pub struct GeminiClient {
    http: Client,
    settings: GeminiSettings,
}

impl GeminiClient {
    /// Construct a client with explicit settings.
    pub fn new(settings: GeminiSettings) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .user_agent("pdf2speech/rewrite")
            .build()
            .map_err(|error| RemoteError::Network(error.to_string()))?;
        tracing::debug!(
            model = %settings.model,
            base_url = %settings.base_url,
            max_retries = settings.max_retries,
            "Initialized Gemini client"
        );
        Ok(Self { http, settings })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Self::new(GeminiSettings::from_config(config)?)
    }

    fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    fn generate_endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url(), self.settings.model)
    }

    fn request_body(
        &self,
        user_message: &str,
        max_tokens: u32,
        system_prompt: Option<&str>,
    ) -> Value {
        let safety_settings: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect();

        let mut body = json!({
            "contents": [{ "parts": [{ "text": user_message }] }],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "maxOutputTokens": max_tokens,
                "topP": 0.95,
                "topK": 40,
            },
            "safetySettings": safety_settings,
        });

        if let Some(prompt) = system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": prompt }] });
        }
        body
    }

    /// Send a prompt, retrying with exponential backoff while the service reports HTTP 429.
    async fn send_request(
        &self,
        user_message: &str,
        max_tokens: u32,
        system_prompt: Option<&str>,
    ) -> Result<String, RemoteError> {
        let body = self.request_body(user_message, max_tokens, system_prompt);
        let mut attempt: u32 = 0;

        loop {
            let response = self
                .http
                .post(self.generate_endpoint())
                .query(&[("key", self.settings.api_key.as_str())])
                .json(&body)
                .send()
                .await
                .map_err(|error| RemoteError::Network(error.to_string()))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.settings.max_retries {
                let delay = self.settings.retry_delay.saturating_mul(2u32.saturating_pow(attempt));
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = self.settings.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited by Gemini; backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(api_error(status, &body));
            }

            let payload: GenerateResponse = response.json().await.map_err(|error| {
                RemoteError::InvalidResponse(format!("failed to decode response: {error}"))
            })?;
            return extract_text(payload);
        }
    }

    /// Send a short probe prompt to confirm the key and model are usable.
    pub async fn test_connection(&self) -> Result<String, RemoteError> {
        self.send_request(CONNECTION_PROBE, CONNECTION_PROBE_TOKENS, None)
            .await
    }

    /// List models available to the configured API key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, RemoteError> {
        let response = self
            .http
            .get(self.base_url())
            .query(&[("key", self.settings.api_key.as_str())])
            .send()
            .await
            .map_err(|error| RemoteError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let payload: ModelsResponse = response.json().await.map_err(|error| {
            RemoteError::InvalidResponse(format!("failed to decode models listing: {error}"))
        })?;
        Ok(payload.models)
    }
}

fn api_error(status: StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));
    RemoteError::Api {
        status: status.as_u16(),
        message,
    }
}

fn extract_text(payload: GenerateResponse) -> Result<String, RemoteError> {
    let content = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .ok_or_else(|| RemoteError::InvalidResponse("missing candidate content".into()))?;

    Ok(content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect())
}

#[async_trait]
impl RewriteClient for GeminiClient {
    async fn rewrite(&self, text: &str, index: usize, total: usize) -> Result<String, RemoteError> {
        if text.trim().is_empty() {
            return Err(RemoteError::EmptyInput);
        }
        let prompt = chunk_prompt(text, index, total);
        self.send_request(
            &prompt,
            self.settings.max_output_tokens,
            self.settings.system_prompt.as_deref(),
        )
        .await
    }
}
