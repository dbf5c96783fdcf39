use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

/// Inclusive range accepted for `CHUNK_SIZE`, expressed in estimated tokens.
pub const CHUNK_SIZE_RANGE: RangeInclusive<usize> = 500..=20_000;
/// Inclusive range accepted for `MAX_OUTPUT_TOKENS`.
pub const MAX_OUTPUT_TOKENS_RANGE: RangeInclusive<u32> = 100..=8_000;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_CHUNK_SIZE: usize = 4_000;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
const DEFAULT_PACING_DELAY_MS: u64 = 100;

/// Instruction sent alongside every chunk unless `SYSTEM_PROMPT` overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a specialized assistant that transforms technical and academic PDF content into text optimized for Text-to-Speech (TTS) applications.

Your core responsibilities:

1. CODE TRANSFORMATION:
   - Convert code blocks and snippets into clear, natural language descriptions
   - Explain what the code does in plain English, focusing on functionality
   - Describe important algorithms, logic flow, and data structures
   - Include variable names and key operations in your descriptions
   - Example: "function add(a, b) { return a + b; }" becomes "A function named 'add' that takes two parameters and returns their sum"

2. FIGURE AND IMAGE HANDLING:
   - Transform figure captions into descriptive text
   - Convert image references into detailed text descriptions
   - Describe diagrams, charts, and graphs in narrative form
   - Example: "Figure 3: System Architecture Diagram" becomes "This figure illustrates the system architecture, showing how the client layer communicates with the server layer through an API gateway"

3. FORMATTING FOR TTS:
   - Use short, clear sentences (15-20 words ideal)
   - Avoid special characters and mathematical notation where possible
   - Replace equations with verbal descriptions
   - Break complex concepts into digestible chunks
   - Use consistent terminology throughout

4. CONTENT PRESERVATION:
   - Maintain the original meaning and technical accuracy
   - Keep section headers and structure intact
   - Preserve important code logic details
   - Don't oversimplify complex technical concepts

5. READABILITY OPTIMIZATION:
   - Add transitional phrases between sections
   - Clarify technical jargon with brief explanations
   - Ensure the output flows naturally when read aloud
   - Optimize punctuation for natural pauses

Process the provided text chunk following these guidelines. Maintain technical accuracy while ensuring the output is clear and speaker-friendly."#;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Environment variable parsed but fell outside the accepted range.
    #[error("{name} must be between {min} and {max}")]
    OutOfRange {
        /// Variable that failed validation.
        name: String,
        /// Smallest accepted value.
        min: String,
        /// Largest accepted value.
        max: String,
    },
}

/// Runtime configuration for the rewriting pipeline.
///
/// Built once at process start and handed to the service layer behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the Gemini REST API. Only required when a rewrite client is built.
    pub api_key: Option<String>,
    /// Model identifier used for `generateContent` calls.
    pub model: String,
    /// Base URL of the models endpoint.
    pub base_url: String,
    /// Token budget per chunk.
    pub chunk_size: usize,
    /// Sampling temperature forwarded to the model.
    pub temperature: f32,
    /// Upper bound on tokens generated per chunk.
    pub max_output_tokens: u32,
    /// System instruction prepended to every request.
    pub system_prompt: String,
    /// Number of retries after a rate-limited (HTTP 429) response.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries, in milliseconds.
    pub retry_delay_ms: u64,
    /// Pause between consecutive chunk requests, in milliseconds.
    pub pacing_delay_ms: u64,
    /// Token estimator used for chunk budgeting.
    pub token_estimator: EstimatorKind,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported token estimation strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EstimatorKind {
    /// Fixed characters-per-token ratio.
    #[default]
    Chars,
    /// BPE token counts from `tiktoken-rs`.
    Tiktoken,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            pacing_delay_ms: DEFAULT_PACING_DELAY_MS,
            token_estimator: EstimatorKind::Chars,
            server_port: None,
        }
    }
}

impl Config {
    /// Load `.env` (when present) and then read configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        tracing::debug!(
            model = %config.model,
            chunk_size = config.chunk_size,
            estimator = ?config.token_estimator,
            has_api_key = config.api_key.is_some(),
            server_port = ?config.server_port,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Read configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            api_key: load_env_optional("GEMINI_API_KEY"),
            model: load_env_optional("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: load_env_optional("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            temperature: parse_optional("TEMPERATURE")?.unwrap_or(defaults.temperature),
            max_output_tokens: parse_optional("MAX_OUTPUT_TOKENS")?
                .unwrap_or(defaults.max_output_tokens),
            system_prompt: load_env_optional("SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            max_retries: parse_optional("REWRITE_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_delay_ms: parse_optional("REWRITE_RETRY_DELAY_MS")?
                .unwrap_or(defaults.retry_delay_ms),
            pacing_delay_ms: parse_optional("PACING_DELAY_MS")?
                .unwrap_or(defaults.pacing_delay_ms),
            token_estimator: load_env_optional("TOKEN_ESTIMATOR")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("TOKEN_ESTIMATOR".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            server_port: parse_optional("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every bounded setting against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue("GEMINI_MODEL".into()));
        }
        check_range("CHUNK_SIZE", self.chunk_size, &CHUNK_SIZE_RANGE)?;
        check_range(
            "MAX_OUTPUT_TOKENS",
            self.max_output_tokens,
            &MAX_OUTPUT_TOKENS_RANGE,
        )?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::OutOfRange {
                name: "TEMPERATURE".into(),
                min: "0".into(),
                max: "2".into(),
            });
        }
        Ok(())
    }

    /// Return the API key, failing when rewriting was requested without one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("GEMINI_API_KEY".into()))
    }

    /// Pause observed between consecutive chunk requests.
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Base delay used for exponential backoff on rate-limited responses.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn check_range<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name: name.to_string(),
            min: range.start().to_string(),
            max: range.end().to_string(),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EstimatorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tiktoken" | "bpe" => Ok(Self::Tiktoken),
            _ => Err(()),
        }
    }
}
