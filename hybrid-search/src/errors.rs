//! Crate-wide error hierarchy for hybrid retrieval.
//!
//! Single root [`SearchError`] for all public functions; collaborator
//! failures (vector store, reranker, embeddings) are wrapped with enough
//! context to tell a degradable path failure from a fatal one.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type SearchResult<T> = Result<T, SearchError>;

/// Root error type for the hybrid-search crate.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Keyword index misuse or build failure.
    #[error(transparent)]
    Keyword(#[from] KeywordError),

    /// Semantic path failure (embedding or vector store).
    #[error("semantic search error: {0}")]
    Semantic(String),

    /// Reranker collaborator failure.
    #[error("rerank error: {0}")]
    Rerank(String),

    /// Both retrieval paths failed for the same query; nothing to fuse.
    #[error("all retrieval paths failed: keyword: {keyword}; semantic: {semantic}")]
    AllPathsFailed { keyword: String, semantic: String },

    /// Embedding/generation service failure.
    #[error(transparent)]
    Llm(#[from] llm_service::LlmError),
}

/// Keyword index errors.
#[derive(Debug, Error)]
pub enum KeywordError {
    /// `search` called before `index_documents`.
    #[error("keyword index not built; call index_documents first")]
    NotIndexed,
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        SearchError::Rerank(e.to_string())
    }
}
