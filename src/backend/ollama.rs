use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::error::{Result, YakusuError};
use super::{Backend, CompletionOptions, strip_thinking};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    num_predict: u32,
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Build the message list; an empty system prompt is omitted
pub(crate) fn build_messages(system_prompt: &str, user_prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !system_prompt.trim().is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: user_prompt.to_string(),
    });
    messages
}

/// Ollama chat backend
pub struct OllamaBackend {
    client: Client,
    config: BackendConfig,
}

impl OllamaBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn complete(
        &mut self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: build_messages(system_prompt, user_prompt),
            stream: false,
            options: ChatOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
                num_ctx: self.config.context_length,
            },
        };

        let url = format!("{}/api/chat", self.config.endpoint);
        debug!("Sending chat request to: {}", url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| YakusuError::Backend(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(YakusuError::Backend(format!(
                "Ollama API error {}: {}", status, error_text
            )));
        }

        let chat_response: ChatResponse = response.json().await
            .map_err(|e| YakusuError::Backend(format!("Failed to parse response: {}", e)))?;

        Ok(strip_thinking(&chat_response.message.content))
    }

    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.endpoint);

        let response = self.client
            .post(&url)
            .json(&json!({ "name": self.config.model }))
            .send()
            .await
            .map_err(|e| YakusuError::Backend(format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.config.model);
            Ok(())
        } else {
            Err(YakusuError::Backend(format!(
                "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                self.config.model, self.config.model
            )))
        }
    }

    async fn release(&mut self) -> Result<()> {
        // keep_alive 0 asks the server to unload the model right away
        let url = format!("{}/api/generate", self.config.endpoint);
        let response = self.client
            .post(&url)
            .json(&json!({ "model": self.config.model, "keep_alive": 0 }))
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Released Ollama model '{}'", self.config.model);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("ollama:{}", self.config.model)
    }
}
