//! OpenAI-compatible translation client.
//!
//! One chat-completion request per translation, with transient-error
//! retry. The [`Translator`] trait is the seam the request handler sees;
//! tests substitute mock implementations to drive the admission policy
//! without a network.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{HermodError, Result};
use crate::lang::language_name;
use crate::sanitize::sanitize_model_output;
use crate::telemetry;

/// Default prompt template when no template file is configured.
const DEFAULT_TEMPLATE: &str = "{{PROMPT_PREFIX}} FROM {{LANGUAGE_BASE}} to {{LANGUAGE_TO}} :: {{TEXT}}";

/// Sampling temperature for translation requests.
const TEMPERATURE: f64 = 0.3;

/// Anything that can produce a translation for a language pair.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `from_lang` to `to_lang`. `request_id` is
    /// the client correlation id, used only for logging.
    async fn translate(
        &self,
        from_lang: &str,
        to_lang: &str,
        text: &str,
        request_id: &str,
    ) -> Result<String>;
}

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff: `initial_delay * 2^attempt`, capped at
/// `max_delay`. A `Retry-After` hint from the upstream takes precedence
/// over the calculated backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 2s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Calculate the backoff delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Effective delay, respecting an upstream `retry_after` hint.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Settings for [`OpenAiTranslator`].
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Endpoint base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier passed through in the request body.
    pub model: String,
    /// Instruction prefix substituted into the prompt template.
    pub prompt_prefix: String,
    /// Prompt template; `None` uses the built-in default.
    pub prompt_template: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

/// Chat-completion client against an OpenAI-compatible endpoint.
pub struct OpenAiTranslator {
    http: reqwest::Client,
    base_url: String,
    model: String,
    prompt_prefix: String,
    prompt_template: String,
    api_key: String,
    retry: RetryConfig,
}

impl OpenAiTranslator {
    /// Build the client. The connection pool is shared across all request
    /// tasks.
    pub fn new(config: TranslatorConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .build()
            .map_err(|e| HermodError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
            prompt_prefix: config.prompt_prefix,
            prompt_template: config
                .prompt_template
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            api_key,
            retry: config.retry,
        })
    }

    /// Substitute template placeholders. When the template carries no
    /// `{{TEXT}}` placeholder, the text is appended after the `" :: "`
    /// separator instead.
    fn build_prompt(&self, from_lang: &str, to_lang: &str, text: &str) -> String {
        let from_name = language_name(from_lang).unwrap_or(from_lang);
        let to_name = language_name(to_lang).unwrap_or(to_lang);

        let prompt = self
            .prompt_template
            .replace("{{PROMPT_PREFIX}}", &self.prompt_prefix)
            .replace("{{LANGUAGE_BASE}}", from_name)
            .replace("{{LANGUAGE_TO}}", to_name);

        if prompt.contains("{{TEXT}}") {
            prompt.replace("{{TEXT}}", text)
        } else if let Some(head) = prompt.split(" :: ").next() {
            format!("{head} :: {text}")
        } else {
            format!("{prompt} :: {text}")
        }
    }

    /// One request/response cycle, classified into transient or permanent
    /// errors for the retry loop.
    async fn request_once(&self, prompt: &str, request_id: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HermodError::Timeout
                } else {
                    HermodError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(HermodError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HermodError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| HermodError::Http(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(HermodError::EmptyResponse)?;

        let cleaned = sanitize_model_output(&content);
        if cleaned.is_empty() {
            return Err(HermodError::EmptyResponse);
        }

        debug!(request_id, "translation completed");
        Ok(cleaned)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        from_lang: &str,
        to_lang: &str,
        text: &str,
        request_id: &str,
    ) -> Result<String> {
        let prompt = self.build_prompt(from_lang, to_lang, text);
        metrics::counter!(telemetry::UPSTREAM_CALLS_TOTAL).increment(1);

        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            match self.request_once(&prompt, request_id).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
                    if attempt + 1 < self.retry.max_attempts {
                        let delay = self.retry.effective_delay(attempt, e.retry_after());
                        warn!(
                            request_id,
                            attempt = attempt + 1,
                            max_attempts = self.retry.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after transient error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_err = Some(e);
                }
                Err(e) => return Err(e), // permanent error, no retry
            }
        }
        Err(last_err.unwrap_or(HermodError::EmptyResponse))
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
