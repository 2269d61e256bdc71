use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, YakusuError};

/// Hard cap on the number of glossary terms kept after frequency filtering
pub const MAX_GLOSSARY_TERMS: usize = 50;

// Default values for fields added after the first config format
fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_auto_glossary() -> bool {
    true
}

fn default_plain_text_chunk_chars() -> usize {
    1500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub translate: TranslateConfig,
    pub glossary: GlossaryConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Ollama native chat API
    Ollama,
    /// Any server speaking the OpenAI chat completions API (llama.cpp server, LM Studio, vLLM)
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Inference runtime to talk to
    pub kind: BackendKind,
    /// Base URL of the inference server
    pub endpoint: String,
    /// Model name as known by the server
    pub model: String,
    /// Optional bearer token for OpenAI-compatible servers
    #[serde(default)]
    pub api_key: Option<String>,
    /// Context window requested from the runtime
    pub context_length: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for a failed completion
    pub max_retries: u32,
    /// Delay between retries, multiplied by the attempt number
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Number of segments translated per request
    pub chunk_size: usize,
    /// Read-only segments shown before and after each chunk
    pub context_size: usize,
    /// Run the critique-then-improve pass on every chunk
    pub reflection_enabled: bool,
    /// Token budget for translation requests
    pub max_tokens: u32,
    /// Sampling temperature for translation, improvement and repair
    pub temperature: f32,
    /// Sampling temperature for the critique request
    pub critique_temperature: f32,
    /// Character budget for one plain-text chunk
    #[serde(default = "default_plain_text_chunk_chars")]
    pub plain_text_chunk_chars: usize,
    /// Generate a glossary before translating when none is stored
    #[serde(default = "default_auto_glossary")]
    pub auto_glossary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryConfig {
    /// Characters per extraction chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive extraction chunks
    pub chunk_overlap: usize,
    /// Minimum whole-document occurrences for a term to be kept
    pub min_term_frequency: usize,
    /// Maximum terms requested from one chunk
    pub max_terms_per_chunk: usize,
    /// Shortest accepted term, in characters
    pub min_term_length: usize,
    /// Longest accepted term, in characters
    pub max_term_length: usize,
    /// Terms kept after filtering (never more than MAX_GLOSSARY_TERMS)
    pub max_terms: usize,
    /// Terms translated per request
    pub batch_size: usize,
    /// Characters recorded on each side of a term occurrence
    pub context_window: usize,
    /// Longest context shown to the model per term
    pub context_max_chars: usize,
    /// Token budget for glossary requests
    pub max_tokens: u32,
    /// Sampling temperature for glossary requests
    pub temperature: f32,
    /// Directory holding per-document glossary files
    pub storage_dir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    /// Compiled gettext catalog (.mo) for status messages
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                kind: BackendKind::Ollama,
                endpoint: "http://localhost:11434".to_string(),
                model: "qwen3:8b".to_string(),
                api_key: None,
                context_length: 4096,
                timeout_secs: 300,
                max_retries: 3,
                retry_delay_ms: default_retry_delay_ms(),
            },
            translate: TranslateConfig {
                chunk_size: 10,
                context_size: 2,
                reflection_enabled: false,
                max_tokens: 2048,
                temperature: 0.2,
                critique_temperature: 0.1,
                plain_text_chunk_chars: default_plain_text_chunk_chars(),
                auto_glossary: default_auto_glossary(),
            },
            glossary: GlossaryConfig {
                chunk_size: 200,
                chunk_overlap: 50,
                min_term_frequency: 2,
                max_terms_per_chunk: 15,
                min_term_length: 2,
                max_term_length: 50,
                max_terms: MAX_GLOSSARY_TERMS,
                batch_size: 10,
                context_window: 80,
                context_max_chars: 150,
                max_tokens: 4096,
                temperature: 0.1,
                storage_dir: ".yakusu/glossary".to_string(),
            },
            ui: UiConfig::default(),
        }
    }
}

impl GlossaryConfig {
    /// Effective term cap after applying the hard limit
    pub fn term_cap(&self) -> usize {
        self.max_terms.min(MAX_GLOSSARY_TERMS)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| YakusuError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| YakusuError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| YakusuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| YakusuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values that would make the pipeline loop forever or do nothing
    pub fn validate(&self) -> Result<()> {
        if self.translate.chunk_size == 0 {
            return Err(YakusuError::Config("translate.chunk_size must be at least 1".to_string()));
        }
        if self.translate.plain_text_chunk_chars == 0 {
            return Err(YakusuError::Config(
                "translate.plain_text_chunk_chars must be at least 1".to_string(),
            ));
        }
        if self.glossary.chunk_size == 0 {
            return Err(YakusuError::Config("glossary.chunk_size must be at least 1".to_string()));
        }
        if self.glossary.chunk_overlap >= self.glossary.chunk_size {
            return Err(YakusuError::Config(
                "glossary.chunk_overlap must be smaller than glossary.chunk_size".to_string(),
            ));
        }
        if self.glossary.batch_size == 0 {
            return Err(YakusuError::Config("glossary.batch_size must be at least 1".to_string()));
        }
        if self.glossary.min_term_length > self.glossary.max_term_length {
            return Err(YakusuError::Config(
                "glossary.min_term_length must not exceed glossary.max_term_length".to_string(),
            ));
        }
        Ok(())
    }
}
