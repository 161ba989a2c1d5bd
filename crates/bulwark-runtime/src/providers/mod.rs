//! LLM provider abstractions for bulwark-runtime.
//!
//! The advisor talks to a generative model only through [`LlmProvider`].
//! Every provider call runs inside a circuit breaker, so a provider only has to
//! report failure honestly; retries for rate limiting are the one concern a
//! provider handles itself.
//!
//! ## Security
//!
//! API keys are held in [`ApiCredential`] and never appear in Debug output.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

mod factory;
mod gemini;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use gemini::{GeminiProvider, GeminiProviderFactory, GEMINI_API_KEY_ENV, GEMINI_MODEL_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Model used when neither config nor environment names one.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const RATE_LIMIT_RETRIES: usize = 3;

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CompletionConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping model backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Provider name for logs and status.
    fn name(&self) -> &str;

    /// Model requested when the caller does not pick one.
    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }
}

/// Retry `call` with exponential backoff while it reports rate limiting.
/// Any other error is returned immediately.
pub async fn retry_rate_limited<F, Fut, T>(call: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    call.retry(
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_times(RATE_LIMIT_RETRIES),
    )
    .when(|e| matches!(e, ProviderError::RateLimited { .. }))
    .notify(|e, delay| tracing::warn!(error = %e, delay = ?delay, "Provider rate limited, retrying"))
    .await
}

/// Stand-in used when no API key is configured. Every call fails, which the
/// breaker counts and the guarded operation answers from degradation.
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for UnconfiguredProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        assert_eq!(ChatMessage::system("rules").role, "system");
        assert_eq!(ChatMessage::user("Hello!").role, "user");
        assert_eq!(ChatMessage::assistant("Hi there!").role, "assistant");
    }

    #[test]
    fn test_default_completion_model() {
        let config = CompletionConfig::default();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(CompletionConfig::new("gemini-pro").model, "gemini-pro");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = retry_rate_limited(|| async {
            if attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                Err(ProviderError::RateLimited { retry_after: None })
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), _> = retry_rate_limited(|| async {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(ProviderError::AuthFailed)
        })
        .await;

        assert!(matches!(result, Err(ProviderError::AuthFailed)));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_always_fails() {
        let provider = UnconfiguredProvider::new("GEMINI_API_KEY not set");
        let result = provider
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(msg)) if msg.contains("GEMINI_API_KEY")));
        assert!(!provider.health_check().await);
    }
}
