//! Provider-agnostic model configuration.
//!
//! One [`LlmModelConfig`] describes everything a client needs: provider,
//! model name, endpoint, optional API key, sampling knobs, and a request
//! timeout. Profiles are loaded from the environment with the prefixes
//! `LLM_FAST_`, `LLM_SLOW_`, and `LLM_EMBED_`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LlmResult, validate_http_endpoint, validate_range_f32};

/// Supported language-model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Local Ollama instance (`/api/generate`, `/api/embeddings`).
    Ollama,
    /// OpenAI-compatible chat API (`/v1/chat/completions`, `/v1/embeddings`).
    OpenAi,
}

impl LlmProvider {
    fn parse(raw: &str) -> LlmResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(ConfigError::UnsupportedProvider(other.to_string()).into()),
        }
    }
}

/// Universal per-model configuration shared by all provider clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Request timeout; defaults to 60s when unset.
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Validates invariants that hold for every provider.
    ///
    /// Provider-specific checks (API key presence for OpenAI) happen in the
    /// client constructors.
    pub fn validate(&self) -> LlmResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("endpoint", &self.endpoint)?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        Ok(())
    }

    /// Loads one profile from the environment under the given prefix.
    ///
    /// Recognized suffixes: `PROVIDER`, `MODEL`, `ENDPOINT`, `API_KEY`,
    /// `MAX_TOKENS`, `TIMEOUT_SECS`. Unset optionals keep their defaults.
    pub fn from_env_prefix(prefix: &str) -> LlmResult<Self> {
        let var = |suffix: &str| std::env::var(format!("{prefix}{suffix}")).ok();

        let provider = match var("PROVIDER") {
            Some(raw) => LlmProvider::parse(&raw)?,
            None => LlmProvider::Ollama,
        };
        let model = var("MODEL").unwrap_or_else(|| default_model(provider).to_string());
        let endpoint = var("ENDPOINT").unwrap_or_else(|| default_endpoint(provider).to_string());
        let api_key = var("API_KEY");
        let max_tokens = match var("MAX_TOKENS") {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| ConfigError::InvalidNumber {
                var: "MAX_TOKENS",
                reason: "expected u32",
            })?),
            None => None,
        };
        let timeout_secs = match var("TIMEOUT_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                var: "TIMEOUT_SECS",
                reason: "expected u64",
            })?),
            None => None,
        };

        let cfg = Self {
            provider,
            model,
            endpoint,
            api_key,
            max_tokens,
            temperature: None,
            timeout_secs,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Ollama => "qwen3:14b",
        LlmProvider::OpenAi => "gpt-4o",
    }
}

fn default_endpoint(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Ollama => "http://127.0.0.1:11434",
        LlmProvider::OpenAi => "https://api.openai.com",
    }
}
