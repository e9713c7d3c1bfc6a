//! Hybrid retrieval for legal-document analysis.
//!
//! Complete retrieval flow for one query:
//! 1. Keyword (BM25) and semantic (vector) retrieval run **concurrently**,
//!    each capped at `retrieval_k`.
//! 2. Reciprocal-rank fusion merges the two ranked lists into one total
//!    order (top `fusion_k`).
//! 3. A reranker pass reorders the fused candidates under a bounded timeout
//!    (top `rerank_k`).
//!
//! Degradation is first-class, never an error:
//! - One retrieval path fails → fusion proceeds over the surviving list.
//! - The reranker times out or fails → fusion order is returned truncated.
//! - Only a simultaneous failure of **both** retrieval paths is fatal.
//!
//! The keyword index is built once per corpus and is read-only at query
//! time; concurrent reads need no locking. Semantic search and reranking are
//! external collaborators behind thin trait seams so tests can drive the
//! engine without a network.

pub mod chunk;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod keyword;
pub mod models;
pub mod rerank;
pub mod semantic;

pub use engine::{HybridSearchConfig, HybridSearchEngine};
pub use errors::{SearchError, SearchResult};
pub use models::{
    Chunk, FusedEntry, RankedEntry, RerankedEntry, RetrievalMethod, SearchContext, SearchHit,
    SearchStatistics,
};
