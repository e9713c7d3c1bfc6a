//! Multi-agent review pipeline for legal-document analysis.
//!
//! Four-stage state machine repeated until convergence or the iteration
//! budget runs out:
//!
//! 1) **Drafting** — the writer role produces a new versioned draft from the
//!    source document and retrieved context (first pass) or from the
//!    previous draft plus revision instructions (later passes).
//! 2) **Reviewing** — every configured reviewer kind (Legal, Risk, Format,
//!    Business) runs concurrently against the current draft; a reviewer's
//!    failure or timeout is recorded, not fatal, unless all of them fail.
//! 3) **Arbitrating** — all feedback for the pass is consolidated into one
//!    prioritized, conflict-resolved list with revision instructions.
//! 4) **Revising** — an empty prioritized list or an exhausted iteration
//!    budget finishes the run with the current draft; otherwise the machine
//!    loops back to Drafting.
//!
//! All roles speak to the language model through the `TextGenerator` seam
//! and expect strict JSON back; a response that fails schema validation is
//! that role's failure. Drafts are never edited in place — each revision is
//! a new version, and the whole history stays on the run for audit.

pub mod errors;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod roles;

pub use errors::{PipelineError, PipelineResult};
pub use models::{
    AnalysisType, ConsolidatedFeedback, Draft, PipelineRun, ReviewFeedback, ReviewIssue,
    ReviewerKind, Severity, SourceDocument, Stage,
};
pub use pipeline::{PipelineConfig, PipelineOutcome, ReviewPipeline};
