// OpenAI-compatible chat completions backend
// Works with llama.cpp server, LM Studio, vLLM and other servers exposing /v1/chat/completions

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::error::{Result, YakusuError};
use super::ollama::{ChatMessage, build_messages};
use super::{Backend, CompletionOptions, strip_thinking};

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

/// Reasoning servers may answer with `"content": null`
#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

pub struct OpenAiBackend {
    client: Client,
    config: BackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.is_empty() => request.bearer_auth(key),
            _ => request,
        }
    }
}

fn completion_text(completion: CompletionResponse) -> Result<String> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| YakusuError::Backend("Response contained no choices".to_string()))?;
    choice
        .message
        .content
        .ok_or_else(|| YakusuError::Backend("Response message has no content".to_string()))
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<String> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(system_prompt, user_prompt),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        };

        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        debug!("Sending chat completion request to: {}", url);

        let response = self
            .authorize(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .map_err(|e| YakusuError::Backend(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(YakusuError::Backend(format!(
                "Chat completion API error {}: {}", status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await
            .map_err(|e| YakusuError::Backend(format!("Failed to parse response: {}", e)))?;

        Ok(strip_thinking(&completion_text(completion)?))
    }

    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/v1/models", self.config.endpoint);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| YakusuError::Backend(format!("Failed to connect to {}: {}", url, e)))?;

        if response.status().is_success() {
            info!("Chat completion server at {} is available", self.config.endpoint);
            Ok(())
        } else {
            Err(YakusuError::Backend(format!(
                "Chat completion server at {} answered {}",
                self.config.endpoint,
                response.status()
            )))
        }
    }

    async fn release(&mut self) -> Result<()> {
        // The server owns the model lifetime; nothing to free client-side
        Ok(())
    }

    fn describe(&self) -> String {
        format!("openai:{}", self.config.model)
    }
}
