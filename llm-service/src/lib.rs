//! Shared language-model service used by the analysis pipeline.
//!
//! Provides:
//! - Provider-agnostic configuration ([`config::LlmModelConfig`]).
//! - Thin non-streaming clients for Ollama and OpenAI-compatible endpoints.
//! - [`profiles::LlmProfiles`]: three logical profiles (**fast**, **slow**,
//!   **embedding**) constructed once and shared via `Arc`.
//! - Bounded retry with exponential backoff for transient failures
//!   (rate limits, 5xx, transport timeouts).
//! - The [`profiles::TextGenerator`] seam consumed by the review roles, so
//!   tests can drive them with in-memory fakes.
//!
//! No `async-trait` and no streaming; provider dispatch is enum-based and
//! every request carries an explicit timeout.

pub mod config;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod profiles;

pub use config::{LlmModelConfig, LlmProvider};
pub use error::{LlmError, LlmResult};
pub use profiles::{GenFuture, LlmProfiles, ProfileHandle, ProfileTier, TextGenerator};
