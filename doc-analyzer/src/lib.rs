//! Analysis orchestrator: one entry point for a full document analysis.
//!
//! Sequencing for one request:
//!
//! 1) **Cache probe** — identical `(content_hash, analysis_type)` requests
//!    are served from the content-addressed report cache.
//! 2) **Retrieval** — deterministic queries are generated from the document
//!    and analysis type, each served by the hybrid engine, merged into one
//!    context.
//! 3) **Review** — the four-stage review pipeline runs to a terminal state.
//! 4) **Assembly** — the three-tier report is built and validated, then
//!    stored in the cache.
//!
//! One end-to-end timeout covers the whole request. When it expires
//! mid-pipeline the caller receives the best completed intermediate result
//! explicitly tagged as partial — never a silently dropped one.

pub mod cache;
pub mod errors;
pub mod queries;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use hybrid_search::{HybridSearchEngine, SearchContext, SearchHit, SearchStatistics};
use report_assembly::AnalysisReport;
use review_pipeline::{
    AnalysisType, PipelineOutcome, PipelineRun, ReviewPipeline, SourceDocument,
};

pub use errors::{AnalyzerError, AnalyzerResult};

/// Orchestrator knobs with the standard defaults.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// End-to-end budget for one request.
    pub end_to_end_timeout: Duration,
    /// Final hits requested from the engine per query.
    pub search_top_k: usize,
    /// Cap on the merged retrieval context.
    pub context_cap: usize,
    /// Memoize finished reports by content hash.
    pub cache_enabled: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            end_to_end_timeout: Duration::from_secs(300),
            search_top_k: 10,
            context_cap: 12,
            cache_enabled: true,
        }
    }
}

impl AnalyzerConfig {
    /// Loads overrides from `ANALYZER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let get = |name: &str, default: usize| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Self {
            end_to_end_timeout: Duration::from_secs(get(
                "ANALYZER_TIMEOUT_SECS",
                defaults.end_to_end_timeout.as_secs() as usize,
            ) as u64),
            search_top_k: get("ANALYZER_SEARCH_TOP_K", defaults.search_top_k),
            context_cap: get("ANALYZER_CONTEXT_CAP", defaults.context_cap),
            cache_enabled: std::env::var("ANALYZER_CACHE_ENABLED")
                .map(|v| v != "false")
                .unwrap_or(defaults.cache_enabled),
        }
    }
}

/// The stage a partial result got through before the deadline hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Retrieval,
    Review,
}

/// Best completed intermediate result of a timed-out request.
#[derive(Debug)]
pub struct PartialAnalysis {
    /// Stage that was in flight when the budget ran out.
    pub interrupted_stage: AnalysisStage,
    /// Merged retrieval context, as far as it got.
    pub context: Option<SearchContext>,
    /// Pipeline run state, when the review stage had started.
    pub run: Option<PipelineRun>,
    pub cause: String,
}

/// Outcome of one analysis request.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Complete(AnalysisReport),
    /// End-to-end timeout hit mid-pipeline; explicitly tagged, not an error.
    Partial(PartialAnalysis),
}

/// Wires the hybrid engine and the review pipeline together for requests.
pub struct DocAnalyzer {
    engine: Arc<HybridSearchEngine>,
    pipeline: ReviewPipeline,
    cache_dir: PathBuf,
    cfg: AnalyzerConfig,
}

impl DocAnalyzer {
    pub fn new(
        engine: Arc<HybridSearchEngine>,
        pipeline: ReviewPipeline,
        cfg: AnalyzerConfig,
    ) -> Self {
        Self {
            engine,
            pipeline,
            cache_dir: cache::cache_root(),
            cfg,
        }
    }

    /// Overrides the report cache location (the env-derived root otherwise).
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }

    /// Runs the full analysis for one document.
    pub async fn analyze(
        &self,
        document: &SourceDocument,
        analysis_type: AnalysisType,
    ) -> AnalyzerResult<AnalysisOutcome> {
        let t0 = Instant::now();
        let deadline = t0 + self.cfg.end_to_end_timeout;

        info!(
            target: "doc_analyzer",
            document = %document.id,
            analysis_type = analysis_type.as_str(),
            "analysis start"
        );

        // ---- Cache probe --------------------------------------------------
        if self.cfg.cache_enabled {
            if let Some(report) =
                cache::load_report(&self.cache_dir, &document.content_hash, analysis_type).await?
            {
                info!(
                    target: "doc_analyzer",
                    document = %document.id,
                    "cache hit; returning memoized report"
                );
                return Ok(AnalysisOutcome::Complete(report));
            }
        }

        // ---- Retrieval ----------------------------------------------------
        let context = match self.retrieve(document, analysis_type, deadline).await? {
            Retrieved::Context(context) => context,
            Retrieved::TimedOut { partial, cause } => {
                warn!(target: "doc_analyzer", cause, "retrieval interrupted by deadline");
                return Ok(AnalysisOutcome::Partial(PartialAnalysis {
                    interrupted_stage: AnalysisStage::Retrieval,
                    context: partial,
                    run: None,
                    cause,
                }));
            }
        };
        debug!(
            target: "doc_analyzer",
            hits = context.hits.len(),
            degraded = context.statistics.is_degraded(),
            "retrieval done"
        );

        // ---- Review -------------------------------------------------------
        let run = match self
            .pipeline
            .run(document, &context, analysis_type, Some(deadline))
            .await?
        {
            PipelineOutcome::Done(run) => run,
            PipelineOutcome::TimedOut(run) => {
                warn!(
                    target: "doc_analyzer",
                    iteration = run.iteration,
                    "review interrupted by deadline"
                );
                return Ok(AnalysisOutcome::Partial(PartialAnalysis {
                    interrupted_stage: AnalysisStage::Review,
                    context: Some(context),
                    run: Some(run),
                    cause: "end-to-end timeout during review".to_string(),
                }));
            }
        };

        // ---- Assembly -----------------------------------------------------
        let report = report_assembly::assemble(document, analysis_type, &run, &context)?;

        if self.cfg.cache_enabled {
            cache::store_report(&self.cache_dir, &document.content_hash, analysis_type, &report)
                .await?;
        }

        info!(
            target: "doc_analyzer",
            document = %document.id,
            rating = report.executive_summary.overall_rating,
            iterations = report.iterations,
            duration_ms = t0.elapsed().as_millis() as u64,
            "analysis done"
        );

        Ok(AnalysisOutcome::Complete(report))
    }

    /// Runs every generated query under the remaining budget and merges the
    /// results into one deduplicated context.
    async fn retrieve(
        &self,
        document: &SourceDocument,
        analysis_type: AnalysisType,
        deadline: Instant,
    ) -> AnalyzerResult<Retrieved> {
        let queries = queries::build_queries(document, analysis_type);
        let mut collected: Vec<SearchContext> = Vec::with_capacity(queries.len());

        for query in &queries {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Retrieved::TimedOut {
                    partial: merge_contexts(&collected, self.cfg.context_cap),
                    cause: format!("deadline before query \"{query}\""),
                });
            }
            match tokio::time::timeout(
                remaining,
                self.engine.search(query, self.cfg.search_top_k),
            )
            .await
            {
                Ok(Ok(context)) => collected.push(context),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Ok(Retrieved::TimedOut {
                        partial: merge_contexts(&collected, self.cfg.context_cap),
                        cause: format!("deadline during query \"{query}\""),
                    });
                }
            }
        }

        let merged = merge_contexts(&collected, self.cfg.context_cap)
            .unwrap_or_else(|| empty_context(&queries));
        Ok(Retrieved::Context(merged))
    }
}

/// Stable content hash for a raw document body (hex SHA-256).
///
/// Normally the document source supplies the hash; this helper serves
/// callers that hold only the raw text.
pub fn content_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

enum Retrieved {
    Context(SearchContext),
    TimedOut {
        partial: Option<SearchContext>,
        cause: String,
    },
}

/// Merges per-query contexts: query order then rank order, first occurrence
/// of a chunk wins, capped and re-ranked 1..n.
fn merge_contexts(contexts: &[SearchContext], cap: usize) -> Option<SearchContext> {
    if contexts.is_empty() {
        return None;
    }

    let mut seen = std::collections::HashSet::new();
    let mut hits: Vec<SearchHit> = Vec::new();
    let mut statistics = SearchStatistics::default();

    for context in contexts {
        statistics.keyword_count += context.statistics.keyword_count;
        statistics.semantic_count += context.statistics.semantic_count;
        statistics.fused_count += context.statistics.fused_count;
        statistics.keyword_failed |= context.statistics.keyword_failed;
        statistics.semantic_failed |= context.statistics.semantic_failed;
        statistics.rerank_skipped |= context.statistics.rerank_skipped;
        statistics.total_duration_ms += context.statistics.total_duration_ms;

        for hit in &context.hits {
            if hits.len() >= cap {
                break;
            }
            if seen.insert(hit.chunk_id.clone()) {
                hits.push(hit.clone());
            }
        }
    }

    for (i, hit) in hits.iter_mut().enumerate() {
        hit.rank = i + 1;
    }
    statistics.final_count = hits.len();

    let query = contexts
        .iter()
        .map(|c| c.query.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    Some(SearchContext {
        query,
        hits,
        statistics,
    })
}

fn empty_context(queries: &[String]) -> SearchContext {
    SearchContext {
        query: queries.join("; "),
        hits: Vec::new(),
        statistics: SearchStatistics::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search::RetrievalMethod;

    fn hit(id: &str, rank: usize) -> SearchHit {
        SearchHit {
            chunk_id: id.to_string(),
            text: format!("text {id}"),
            score: 1.0 / rank as f64,
            method: RetrievalMethod::Fusion,
            rank,
        }
    }

    fn context(query: &str, hits: Vec<SearchHit>) -> SearchContext {
        SearchContext {
            query: query.to_string(),
            hits,
            statistics: SearchStatistics::default(),
        }
    }

    #[test]
    fn merge_deduplicates_and_reranks() {
        let a = context("q1", vec![hit("x", 1), hit("y", 2)]);
        let b = context("q2", vec![hit("y", 1), hit("z", 2)]);
        let merged = merge_contexts(&[a, b], 10).unwrap();

        let ids: Vec<&str> = merged.hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        let ranks: Vec<usize> = merged.hits.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(merged.query, "q1; q2");
    }

    #[test]
    fn merge_respects_the_cap() {
        let a = context("q1", vec![hit("a", 1), hit("b", 2), hit("c", 3)]);
        let merged = merge_contexts(&[a], 2).unwrap();
        assert_eq!(merged.hits.len(), 2);
    }

    #[test]
    fn merge_of_nothing_is_none() {
        assert!(merge_contexts(&[], 5).is_none());
    }
}
