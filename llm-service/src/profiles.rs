//! Logical model profiles: **fast**, **slow**, and **embedding**.
//!
//! - Construct once, wrap in `Arc`, pass clones to dependents.
//! - If the slow profile is not configured, it falls back to fast.
//! - Every call goes through a bounded retry loop: transient failures
//!   (rate limit, 5xx, transport timeout) are retried with exponential
//!   backoff; permanent failures surface immediately.
//! - Provider dispatch is enum-based; no `async-trait`, no boxed clients.
//!
//! The [`TextGenerator`] seam is the only thing the review roles see, so
//! tests can substitute an in-memory fake.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{LlmModelConfig, LlmProvider};
use crate::error::{LlmError, LlmResult};
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;

/// Retry attempts for transient failures (first try included).
const RETRY_ATTEMPTS: u32 = 3;
/// Base backoff delay, doubled on each retry.
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Which logical profile a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTier {
    Fast,
    Slow,
    Embedding,
}

/// Provider-dispatched client for one profile.
enum ProviderClient {
    Ollama(OllamaClient),
    OpenAi(OpenAiClient),
}

impl ProviderClient {
    fn from_config(cfg: LlmModelConfig) -> LlmResult<Self> {
        match cfg.provider {
            LlmProvider::Ollama => Ok(ProviderClient::Ollama(OllamaClient::new(cfg)?)),
            LlmProvider::OpenAi => Ok(ProviderClient::OpenAi(OpenAiClient::new(cfg)?)),
        }
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        match self {
            ProviderClient::Ollama(c) => c.generate(prompt, system).await,
            ProviderClient::OpenAi(c) => c.generate(prompt, system).await,
        }
    }

    async fn embeddings(&self, input: &str) -> LlmResult<Vec<f32>> {
        match self {
            ProviderClient::Ollama(c) => c.embeddings(input).await,
            ProviderClient::OpenAi(c) => c.embeddings(input).await,
        }
    }
}

/// Shared service managing the three logical profiles.
pub struct LlmProfiles {
    fast: ProviderClient,
    slow: ProviderClient,
    embedding: ProviderClient,
}

impl LlmProfiles {
    /// Creates the service from per-profile configs.
    ///
    /// `slow_opt = None` makes the slow tier an alias of the fast config.
    pub fn new(
        fast: LlmModelConfig,
        slow_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
    ) -> LlmResult<Self> {
        let slow_cfg = slow_opt.unwrap_or_else(|| fast.clone());
        Ok(Self {
            fast: ProviderClient::from_config(fast)?,
            slow: ProviderClient::from_config(slow_cfg)?,
            embedding: ProviderClient::from_config(embedding)?,
        })
    }

    /// Loads all three profiles from the environment
    /// (`LLM_FAST_*`, `LLM_SLOW_*`, `LLM_EMBED_*`).
    pub fn from_env() -> LlmResult<Self> {
        let fast = LlmModelConfig::from_env_prefix("LLM_FAST_")?;
        let slow = match std::env::var("LLM_SLOW_MODEL") {
            Ok(_) => Some(LlmModelConfig::from_env_prefix("LLM_SLOW_")?),
            Err(_) => None,
        };
        let mut embedding = LlmModelConfig::from_env_prefix("LLM_EMBED_")?;
        if std::env::var("LLM_EMBED_MODEL").is_err() {
            embedding.model = "nomic-embed-text".to_string();
        }
        Self::new(fast, slow, embedding)
    }

    /// Generates text using the requested tier, with bounded retries.
    pub async fn generate(
        &self,
        tier: ProfileTier,
        prompt: &str,
        system: Option<&str>,
    ) -> LlmResult<String> {
        let client = self.client_for(tier);
        with_retries(|| client.generate(prompt, system)).await
    }

    /// Computes an embedding using the embedding profile, with bounded retries.
    pub async fn embed(&self, input: &str) -> LlmResult<Vec<f32>> {
        with_retries(|| self.embedding.embeddings(input)).await
    }

    fn client_for(&self, tier: ProfileTier) -> &ProviderClient {
        match tier {
            ProfileTier::Fast => &self.fast,
            ProfileTier::Slow => &self.slow,
            ProfileTier::Embedding => &self.embedding,
        }
    }
}

/// Retries transient failures with exponential backoff.
///
/// Permanent failures (4xx, config, decode) return on the first occurrence;
/// the last transient error is returned once attempts are exhausted.
async fn with_retries<T, F, Fut>(mut call: F) -> LlmResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LlmResult<T>>,
{
    let mut last_err: Option<LlmError> = None;
    for attempt in 0..RETRY_ATTEMPTS {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying llm call");
            tokio::time::sleep(delay).await;
        }
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() => {
                warn!(attempt, error = %e, "transient llm failure");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.expect("retry loop ran at least once"))
}

/// Delay before retry number `attempt` (attempt >= 1).
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS << (attempt - 1))
}

/* ------------------------------------------------------------------------- */
/* Generation seam                                                           */
/* ------------------------------------------------------------------------- */

/// Boxed future alias used by the generation seam.
pub type GenFuture<'a> = Pin<Box<dyn Future<Output = LlmResult<String>> + Send + 'a>>;

/// Text-generation provider interface consumed by the review roles.
///
/// Implement this to plug in another backend or a test fake. Async via a
/// boxed future because real providers perform HTTP requests.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str, system: Option<&'a str>) -> GenFuture<'a>;
}

/// [`TextGenerator`] bound to one tier of a shared [`LlmProfiles`].
#[derive(Clone)]
pub struct ProfileHandle {
    svc: Arc<LlmProfiles>,
    tier: ProfileTier,
}

impl ProfileHandle {
    /// Binds the shared service to one tier behind the generation seam.
    pub fn new(svc: Arc<LlmProfiles>, tier: ProfileTier) -> Self {
        Self { svc, tier }
    }
}

impl TextGenerator for ProfileHandle {
    fn generate<'a>(&'a self, prompt: &'a str, system: Option<&'a str>) -> GenFuture<'a> {
        Box::pin(self.svc.generate(self.tier, prompt, system))
    }
}
