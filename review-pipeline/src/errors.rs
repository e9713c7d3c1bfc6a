//! Crate-wide error hierarchy for the review pipeline.
//!
//! A stage that cannot recover surfaces as a typed error naming the stage;
//! recoverable failures (single reviewer down, instructions generation
//! failed) are handled locally and never reach this type.

use thiserror::Error;

use crate::models::Stage;

/// Convenient alias for crate-wide results.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Root error type for the review pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The writer role failed entirely; nothing to review.
    #[error("writer failed during {stage:?}: {cause}")]
    Writer { stage: Stage, cause: String },

    /// Every configured reviewer failed or timed out in one pass.
    #[error("all reviewers failed in iteration {iteration}")]
    AllReviewersFailed { iteration: u32 },

    /// A role's structured output failed schema validation.
    #[error("{role} output failed schema validation: {detail}")]
    Schema { role: &'static str, detail: String },

    /// Language-model collaborator failure that a role could not absorb.
    #[error(transparent)]
    Llm(#[from] llm_service::LlmError),
}
