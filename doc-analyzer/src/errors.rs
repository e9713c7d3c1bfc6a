//! Crate-wide error hierarchy for the analysis orchestrator.
//!
//! Every fatal failure names the stage it came from; degraded and partial
//! outcomes are not errors and travel through `AnalysisOutcome` instead.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Root error type for the orchestrator.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Retrieval stage failure (both paths down).
    #[error("retrieval stage failed: {0}")]
    Retrieval(#[from] hybrid_search::SearchError),

    /// Review stage failure (writer down, or every reviewer down).
    #[error("review stage failed: {0}")]
    Review(#[from] review_pipeline::PipelineError),

    /// Assembly stage failure (structural validation).
    #[error("assembly stage failed: {0}")]
    Assembly(#[from] report_assembly::AssemblyError),

    /// Report cache failure (file I/O / JSON).
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// File cache related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
