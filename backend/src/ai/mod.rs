//! Multi-provider AI gateway.
//!
//! Providers are tried in the configured order. A failure moves on to the
//! next provider only when it looks transient (see [`should_try_next`]);
//! anything else is returned to the caller as-is.

pub mod huggingface;
pub mod openai;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::{AppError, Result};

use self::huggingface::HuggingFaceProvider;
use self::openai::ChatCompletionsProvider;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are InnoVest risk copilot. Return practical, concise financial risk insights.";

const NO_PROVIDER_HINT: &str =
    "No AI provider configured. Set OPENAI_API_KEY or GROQ_API_KEY or HUGGINGFACE_API_KEY.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{provider}] {message} ({details})")]
pub struct AiError {
    pub status: u16,
    pub provider: String,
    pub message: String,
    pub details: String,
    pub can_fallback: bool,
}

impl AiError {
    pub fn new(
        status: u16,
        provider: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
        can_fallback: bool,
    ) -> Self {
        Self {
            status,
            provider: provider.into(),
            message: message.into(),
            details: details.into(),
            can_fallback,
        }
    }

    pub(crate) fn missing_key(provider: &str, label: &str, var: &str) -> Self {
        Self::new(
            503,
            provider,
            format!("{} key missing", label),
            format!("{} is not configured", var),
            true,
        )
    }

    pub(crate) fn empty_content(provider: &str, label: &str, details: &str) -> Self {
        Self::new(
            502,
            provider,
            format!("{} returned empty content.", label),
            details,
            true,
        )
    }

    /// Whether the failure is an outage or quota problem the local demo
    /// engine should paper over, as opposed to a bad request.
    pub fn warrants_demo(&self) -> bool {
        if self.status == 401 || self.status == 429 || self.provider == "multi" {
            return true;
        }

        let details = self.details.to_lowercase();
        ["quota", "rate limit", "insufficient_quota", "billing", "openai"]
            .iter()
            .any(|needle| details.contains(needle))
    }
}

pub type AiResult<T> = std::result::Result<T, AiError>;

/// Transient failures worth retrying on the next provider.
pub fn should_try_next(error: &AiError) -> bool {
    error.can_fallback || error.status >= 500 || matches!(error.status, 408 | 425 | 429)
}

/// Pull the assistant text out of a chat-completions style body.
pub fn extract_text_from_choices(data: &Value) -> String {
    let content = &data["choices"][0]["message"]["content"];

    if let Some(text) = content.as_str() {
        return text.to_string();
    }

    content
        .as_array()
        .and_then(|chunks| {
            chunks.iter().find_map(|chunk| {
                if chunk["type"] == "text" {
                    chunk["text"].as_str().filter(|t| !t.is_empty())
                } else {
                    None
                }
            })
        })
        .unwrap_or_default()
        .to_string()
}

/// Maps transport failures onto the status the fallback rules understand.
pub(crate) fn transport_error(provider: &str, label: &str, error: reqwest::Error) -> AiError {
    let status = if error.is_timeout() {
        408
    } else {
        error.status().map(|s| s.as_u16()).unwrap_or(500)
    };

    AiError::new(
        status,
        provider,
        format!("{} request failed.", label),
        error.to_string(),
        status == 429 || status >= 500,
    )
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, message: &str, system_prompt: &str) -> AiResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiReply {
    pub text: String,
    pub provider: String,
}

pub struct AiGateway {
    providers: Vec<Box<dyn AiProvider>>,
}

impl AiGateway {
    pub fn new(providers: Vec<Box<dyn AiProvider>>) -> Self {
        Self { providers }
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client setup failed: {}", e)))?;

        let mut providers: Vec<Box<dyn AiProvider>> = Vec::new();
        for name in config.provider_order() {
            match name.as_str() {
                "openai" => providers.push(Box::new(ChatCompletionsProvider::openai(
                    client.clone(),
                    &config.openai,
                    config.temperature,
                ))),
                "groq" => providers.push(Box::new(ChatCompletionsProvider::groq(
                    client.clone(),
                    &config.groq,
                    config.temperature,
                ))),
                "huggingface" => providers.push(Box::new(HuggingFaceProvider::new(
                    client.clone(),
                    &config.huggingface,
                    config.temperature,
                ))),
                other => warn!("Ignoring unknown AI provider '{}'", other),
            }
        }

        Ok(Self::new(providers))
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn ask(&self, message: &str, system_prompt: Option<&str>) -> AiResult<AiReply> {
        let system_prompt = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let mut failures = Vec::new();

        for provider in &self.providers {
            debug!(provider = provider.name(), "Querying AI provider");

            match provider.complete(message, system_prompt).await {
                Ok(text) => {
                    info!(provider = provider.name(), "AI provider answered");
                    return Ok(AiReply {
                        text,
                        provider: provider.name().to_string(),
                    });
                }
                Err(error) => {
                    failures.push(format!("[{}] {}", error.provider, error.details));

                    if !should_try_next(&error) {
                        warn!(provider = provider.name(), status = error.status, "AI provider failed, not retrying: {}", error.details);
                        return Err(error);
                    }
                    warn!(provider = provider.name(), status = error.status, "AI provider failed, trying next: {}", error.details);
                }
            }
        }

        let details = if failures.is_empty() {
            NO_PROVIDER_HINT.to_string()
        } else {
            failures.join(" | ")
        };

        Err(AiError::new(503, "multi", "All AI providers failed.", details, false))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A base URL nothing is listening on.
    pub async fn dead_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        outcome: AiResult<String>,
        calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn boxed(name: &'static str, outcome: AiResult<String>, calls: &Arc<AtomicUsize>) -> Box<dyn AiProvider> {
            Box::new(Self {
                name,
                outcome,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl AiProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _message: &str, _system_prompt: &str) -> AiResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn rate_limited(provider: &str) -> AiError {
        AiError::new(429, provider, "request failed.", "Rate limit reached", true)
    }

    #[test]
    fn retryable_statuses() {
        let mut error = AiError::new(400, "openai", "bad", "bad request", false);
        assert!(!should_try_next(&error));

        for status in [408, 425, 429, 500, 503] {
            error.status = status;
            assert!(should_try_next(&error), "status {} should fall back", status);
        }

        error.status = 401;
        error.can_fallback = true;
        assert!(should_try_next(&error));
    }

    #[test]
    fn extracts_text_from_string_and_chunked_content() {
        let plain = json!({ "choices": [{ "message": { "content": "Risk is HIGH" } }] });
        assert_eq!(extract_text_from_choices(&plain), "Risk is HIGH");

        let chunked = json!({ "choices": [{ "message": { "content": [
            { "type": "image", "url": "x" },
            { "type": "text", "text": "Chunked answer" }
        ] } }] });
        assert_eq!(extract_text_from_choices(&chunked), "Chunked answer");

        assert_eq!(extract_text_from_choices(&json!({ "choices": [] })), "");
        assert_eq!(extract_text_from_choices(&json!({})), "");
    }

    #[test]
    fn demo_fallback_only_for_outages_and_quota() {
        assert!(rate_limited("groq").warrants_demo());
        assert!(AiError::new(503, "multi", "All AI providers failed.", "x", false).warrants_demo());
        assert!(AiError::new(400, "groq", "Groq request failed.", "billing hard limit", false).warrants_demo());
        assert!(!AiError::new(400, "groq", "Groq request failed.", "context too long", false).warrants_demo());
        // Provider labels in the message do not count.
        assert!(!AiError::new(400, "openai", "OpenAI request failed.", "context too long", false).warrants_demo());
        assert!(AiError::new(403, "openai", "OpenAI request failed.", "Check your OpenAI plan", false).warrants_demo());
    }

    #[tokio::test]
    async fn falls_through_to_next_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = AiGateway::new(vec![
            StubProvider::boxed("openai", Err(rate_limited("openai")), &calls),
            StubProvider::boxed("groq", Ok("Moderate risk".into()), &calls),
        ]);

        let reply = gateway.ask("assess", None).await.unwrap();
        assert_eq!(reply.provider, "groq");
        assert_eq!(reply.text, "Moderate risk");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fatal = AiError::new(400, "openai", "OpenAI request failed.", "bad request", false);
        let gateway = AiGateway::new(vec![
            StubProvider::boxed("openai", Err(fatal.clone()), &calls),
            StubProvider::boxed("groq", Ok("never".into()), &calls),
        ]);

        let error = gateway.ask("assess", None).await.unwrap_err();
        assert_eq!(error, fatal);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_chain_combines_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = AiGateway::new(vec![
            StubProvider::boxed("openai", Err(AiError::missing_key("openai", "OpenAI", "OPENAI_API_KEY")), &calls),
            StubProvider::boxed("groq", Err(rate_limited("groq")), &calls),
        ]);

        let error = gateway.ask("assess", None).await.unwrap_err();
        assert_eq!(error.status, 503);
        assert_eq!(error.provider, "multi");
        assert_eq!(error.message, "All AI providers failed.");
        assert_eq!(
            error.details,
            "[openai] OPENAI_API_KEY is not configured | [groq] Rate limit reached"
        );
    }

    #[tokio::test]
    async fn empty_chain_explains_configuration() {
        let gateway = AiGateway::new(Vec::new());
        let error = gateway.ask("assess", None).await.unwrap_err();
        assert_eq!(error.details, NO_PROVIDER_HINT);
    }

    #[test]
    fn unknown_providers_are_skipped() {
        let config = AiConfig {
            provider_order: "groq,anthropic,huggingface".into(),
            ..AiConfig::default()
        };
        let gateway = AiGateway::from_config(&config).unwrap();
        assert_eq!(gateway.provider_names(), vec!["groq", "huggingface"]);
    }
}
