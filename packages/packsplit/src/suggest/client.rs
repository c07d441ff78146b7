//! Suggestion service clients.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::SuggestionBackend;
use crate::config::LlmConfig;
use crate::error::{PackSplitError, Result};

/// User agent string identifying this tool.
const USER_AGENT: &str = concat!("packsplit/", env!("CARGO_PKG_VERSION"));

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 500;

const MAX_TOKENS: u32 = 1024;

const SYSTEM_PROMPT: &str = "You help prepare source repositories for a context-limited \
language model. Given a summary of a directory, list glob patterns (relative to that \
directory, gitignore style) for files that add no value when reading the code: generated \
files, vendored dependencies, build output, fixtures, binary and media assets, lockfiles. \
Never exclude hand-written source code or documentation. Answer with a JSON array of \
strings and nothing else.";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for an Anthropic-compatible messages endpoint.
///
/// NOTE: Do NOT derive `Debug` on this struct, `api_key` would be exposed.
pub struct LlmSuggester {
    http: Client,
    api_key: String,
    api_base_url: String,
    model: String,
    retry_base: Duration,
}

impl LlmSuggester {
    /// Create a client for the service described by `config`.
    ///
    /// # Arguments
    /// * `config` - Key, model, base URL and timeout
    ///
    /// # Errors
    /// Returns `Http` if the HTTP client cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry_base: Duration::from_millis(RETRY_BASE_DELAY_MS),
        })
    }

    /// Override the first backoff delay; later retries double it.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base = delay;
        self
    }
}

impl SuggestionBackend for LlmSuggester {
    fn suggest(&self, digest: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.api_base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: digest,
            }],
        };

        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: base, 2x base, ...
                let delay = self.retry_base * (1 << (attempt - 1));
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying suggestion request");
                thread::sleep(delay);
            }

            let response = match self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
            {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        "connection error, will retry"
                    );
                    last_error = Some(e.to_string());
                    continue;
                }
                Err(e) => return Err(PackSplitError::Http(e)),
            };

            let status = response.status();
            if status.is_server_error() {
                tracing::warn!(
                    status = %status,
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "server error, will retry"
                );
                last_error = Some(format!("server error: {status}"));
                continue;
            }

            if !status.is_success() {
                let text = response.text().unwrap_or_default();
                let message = serde_json::from_str::<ErrorResponse>(&text)
                    .ok()
                    .and_then(|r| r.error)
                    .map(|e| e.message)
                    .unwrap_or(text);
                return Err(PackSplitError::SuggestionRequest(format!(
                    "{status}: {message}"
                )));
            }

            let parsed: MessagesResponse = response
                .json()
                .map_err(|e| PackSplitError::SuggestionParse(e.to_string()))?;
            let content: String = parsed
                .content
                .into_iter()
                .filter_map(|block| block.text)
                .collect();
            if content.trim().is_empty() {
                return Err(PackSplitError::SuggestionParse(
                    "empty response".to_string(),
                ));
            }
            return Ok(content);
        }

        Err(PackSplitError::SuggestionRequest(format!(
            "gave up after {MAX_RETRIES} attempts: {}",
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

/// Stand-in used when suggestions are wanted but no API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredSuggester;

impl SuggestionBackend for UnconfiguredSuggester {
    fn suggest(&self, _digest: &str) -> Result<String> {
        Err(PackSplitError::SuggestionRequest(
            "LLM_API_KEY is not set".to_string(),
        ))
    }
}
