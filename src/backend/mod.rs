// Inference backend adapters
//
// Pipeline code depends only on the `Backend` trait. One implementation exists
// per supported runtime:
// - Ollama: native /api/chat
// - OpenAi: OpenAI-compatible /v1/chat/completions (llama.cpp server, LM Studio, vLLM)
//
// A backend instance holds one loaded model and serves one inference at a time;
// `complete` takes `&mut self` so it can never be called concurrently.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{BackendConfig, BackendKind};
use crate::error::{Result, YakusuError};

static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think regex"));

/// Sampling options for one completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self { max_tokens, temperature }
    }
}

/// Chat completion capability of a local inference engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run one chat completion. An empty `system_prompt` sends the user message alone.
    /// The returned text has reasoning (`<think>`) content removed.
    async fn complete(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<String>;

    /// Check that the runtime is reachable and the model is available
    async fn check_availability(&self) -> Result<()>;

    /// Free the model held by the runtime at the end of a run
    async fn release(&mut self) -> Result<()>;

    /// Human-readable identifier for logs
    fn describe(&self) -> String;
}

/// How many times a failed completion is retried, and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.retry_delay_ms))
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    pub fn create_backend(config: &BackendConfig) -> Result<Box<dyn Backend>> {
        match config.kind {
            BackendKind::Ollama => Ok(Box::new(ollama::OllamaBackend::new(config.clone())?)),
            BackendKind::OpenAi => Ok(Box::new(openai::OpenAiBackend::new(config.clone())?)),
        }
    }
}

/// Remove reasoning blocks emitted by "thinking" models
pub fn strip_thinking(text: &str) -> String {
    THINK_RE.replace_all(text, "").trim().to_string()
}

/// Call the backend, retrying failed calls up to `max_retries` times
pub async fn complete_with_retry(
    backend: &mut dyn Backend,
    system_prompt: &str,
    user_prompt: &str,
    options: CompletionOptions,
    retry: RetryPolicy,
) -> Result<String> {
    let max_retries = retry.max_retries;
    let mut attempt = 0;
    loop {
        match backend.complete(system_prompt, user_prompt, options).await {
            Ok(text) => {
                debug!("Completion from {} ({} chars)", backend.describe(), text.len());
                return Ok(text);
            }
            Err(e) if attempt < max_retries => {
                attempt += 1;
                warn!(
                    "Completion failed on {} (attempt {}/{}): {}",
                    backend.describe(),
                    attempt,
                    max_retries,
                    e
                );
                if !retry.delay.is_zero() {
                    tokio::time::sleep(retry.delay * attempt).await;
                }
            }
            Err(e) => {
                return Err(YakusuError::Backend(format!(
                    "{} failed after {} attempts: {}",
                    backend.describe(),
                    attempt + 1,
                    e
                )));
            }
        }
    }
}
