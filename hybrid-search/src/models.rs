//! Retrieval data model: chunks, ranked entries, fusion output, and the
//! search context handed to the review pipeline.

use serde::{Deserialize, Serialize};

/// Which stage produced a hit's ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrievalMethod {
    Keyword,
    Semantic,
    Fusion,
    Rerank,
}

/// Immutable unit of indexed text.
///
/// Created at indexing time and never mutated; owned by the keyword index
/// and mirrored by the semantic store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// Approximate token count (chars/4 heuristic).
    pub token_count: usize,
    pub source_document_id: String,
}

/// One entry of a single-path ranked list.
///
/// `rank` is 1-based, strictly increasing and unique within its list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub chunk_id: String,
    pub rank: usize,
    pub score: f64,
}

/// Output of reciprocal-rank fusion.
///
/// Ordering is total: fused score descending, then `best_rank` ascending,
/// then `chunk_id` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedEntry {
    pub chunk_id: String,
    pub fused_score: f64,
    /// Smallest (best) rank across the contributing lists; tie-break key.
    pub best_rank: usize,
}

/// Final precision-ordered entry; `relevance` is provider-defined and used
/// only for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedEntry {
    pub chunk_id: String,
    pub relevance: f64,
}

/// One result of a full hybrid search, with resolved text for prompting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub text: String,
    pub score: f64,
    pub method: RetrievalMethod,
    /// 1-based position in the final ordering.
    pub rank: usize,
}

/// Per-phase counters and timings for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub keyword_count: usize,
    pub semantic_count: usize,
    pub fused_count: usize,
    pub final_count: usize,

    pub keyword_duration_ms: u64,
    pub semantic_duration_ms: u64,
    pub rerank_duration_ms: u64,
    pub total_duration_ms: u64,

    /// Set when the keyword path raised an error (degraded, not fatal).
    pub keyword_failed: bool,
    /// Set when the semantic path raised an error (degraded, not fatal).
    pub semantic_failed: bool,
    /// Set when the rerank pass was skipped (timeout/failure/not configured).
    pub rerank_skipped: bool,
}

impl SearchStatistics {
    /// Whether any path degraded while serving this query.
    pub fn is_degraded(&self) -> bool {
        self.keyword_failed || self.semantic_failed || self.rerank_skipped
    }
}

/// Everything the caller needs from one hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchContext {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub statistics: SearchStatistics,
}

impl SearchContext {
    pub fn has_results(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Renders the hits as a plain-text block for prompt building.
    pub fn to_prompt_block(&self) -> String {
        if self.hits.is_empty() {
            return format!("No relevant sources found for query: {}", self.query);
        }
        let mut out = vec![format!(
            "Query: {} ({} sources)",
            self.query,
            self.hits.len()
        )];
        for hit in &self.hits {
            out.push(format!(
                "{}. [{}] (score {:.3})\n   {}",
                hit.rank,
                hit.chunk_id,
                hit.score,
                truncate(&hit.text, 400)
            ));
        }
        out.join("\n")
    }
}

pub(crate) fn truncate(s: &str, n: usize) -> String {
    if s.chars().count() <= n {
        return s.to_string();
    }
    s.chars().take(n).collect::<String>() + "…"
}
