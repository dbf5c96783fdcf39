//! Remote rewriting service abstraction.
//!
//! The pipeline only depends on [`RewriteClient`]; [`GeminiClient`] is the production adapter for
//! the Gemini `generateContent` REST endpoint. Retry and backoff for rate limiting live inside the
//! adapter, so every error that reaches the pipeline is final for that chunk.

mod gemini;

pub use gemini::{GeminiClient, GeminiSettings, ModelInfo};

use crate::config::ConfigError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the rewriting service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The client was missing required settings such as the API key.
    #[error("Rewrite client not configured: {0}")]
    Configuration(#[from] ConfigError),
    /// The chunk handed to the client had no content.
    #[error("Text content is empty")]
    EmptyInput,
    /// The service could not be reached.
    #[error("Network error: {0}")]
    Network(String),
    /// The service answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code returned by the service.
        status: u16,
        /// Message extracted from the error body, or a generic status description.
        message: String,
    },
    /// The service answered successfully but the body did not have the expected shape.
    #[error("Invalid API response format: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by text rewriting backends.
#[async_trait]
pub trait RewriteClient: Send + Sync {
    /// Rewrite chunk `index` (zero-based) of `total`.
    async fn rewrite(&self, text: &str, index: usize, total: usize) -> Result<String, RemoteError>;
}

/// Prompt sent for a single chunk; the position is reported one-based.
pub fn chunk_prompt(text: &str, index: usize, total: usize) -> String {
    format!(
        "Process the following text chunk ({}/{}):\n\n{}",
        index + 1,
        total,
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_reports_one_based_position() {
        let prompt = chunk_prompt("Body text.", 2, 5);
        assert_eq!(
            prompt,
            "Process the following text chunk (3/5):\n\nBody text."
        );
    }

    #[test]
    fn api_error_display_includes_status() {
        let error = RemoteError::Api {
            status: 429,
            message: "Resource exhausted".into(),
        };
        assert_eq!(error.to_string(), "Resource exhausted (HTTP 429)");
    }
}
