//! Hybrid query engine: dual-path retrieval → fusion → timed rerank.
//!
//! Flow for one query:
//!   1) keyword + semantic retrieval run concurrently (each `retrieval_k`);
//!   2) degradation check: one failed path → continue on the survivor,
//!      both failed → hard error;
//!   3) RRF fusion to `fusion_k`;
//!   4) rerank under `rerank_timeout`, falling back to fusion order.
//!
//! Deterministic given identical inputs and collaborator responses: fusion
//! is order-independent of which path completes first, and every tie-break
//! is total.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::{SearchError, SearchResult};
use crate::fusion;
use crate::keyword::KeywordIndex;
use crate::models::{FusedEntry, RetrievalMethod, SearchContext, SearchHit, SearchStatistics};
use crate::rerank::{Rerank, RerankCandidate};
use crate::semantic::SemanticSearch;

/// Retrieval knobs with the standard defaults.
#[derive(Debug, Clone)]
pub struct HybridSearchConfig {
    /// Initial candidates per retrieval path.
    pub retrieval_k: usize,
    /// Candidates surviving fusion.
    pub fusion_k: usize,
    /// Final result cap after reranking.
    pub rerank_k: usize,
    /// RRF smoothing constant.
    pub rrf_k: u32,
    /// Bound on one reranker call.
    pub rerank_timeout: Duration,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 50,
            fusion_k: 20,
            rerank_k: 10,
            rrf_k: fusion::DEFAULT_RRF_K,
            rerank_timeout: Duration::from_secs(10),
        }
    }
}

impl HybridSearchConfig {
    /// Loads overrides from `HYBRID_*` environment variables.
    pub fn from_env() -> Self {
        let get = |name: &str, default: usize| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        let defaults = Self::default();
        Self {
            retrieval_k: get("HYBRID_RETRIEVAL_K", defaults.retrieval_k),
            fusion_k: get("HYBRID_FUSION_K", defaults.fusion_k),
            rerank_k: get("HYBRID_RERANK_K", defaults.rerank_k),
            rrf_k: get("HYBRID_RRF_K", defaults.rrf_k as usize) as u32,
            rerank_timeout: Duration::from_secs(
                get("HYBRID_RERANK_TIMEOUT_SECS", 10) as u64
            ),
        }
    }
}

/// Orchestrates the keyword index, the semantic client, and the optional
/// reranker for one corpus.
pub struct HybridSearchEngine {
    keyword: Arc<KeywordIndex>,
    semantic: Arc<dyn SemanticSearch>,
    reranker: Option<Arc<dyn Rerank>>,
    cfg: HybridSearchConfig,
}

impl HybridSearchEngine {
    pub fn new(
        keyword: Arc<KeywordIndex>,
        semantic: Arc<dyn SemanticSearch>,
        reranker: Option<Arc<dyn Rerank>>,
        cfg: HybridSearchConfig,
    ) -> Self {
        Self {
            keyword,
            semantic,
            reranker,
            cfg,
        }
    }

    /// Runs the full hybrid flow and returns a precision-ordered context.
    ///
    /// `top_k` caps the final list; asking for more than exists returns all
    /// available hits, ordered. Only a simultaneous failure of both
    /// retrieval paths is an error.
    pub async fn search(&self, query: &str, top_k: usize) -> SearchResult<SearchContext> {
        let t0 = Instant::now();
        let mut stats = SearchStatistics::default();

        // ---- Phase 1: concurrent dual-path retrieval -----------------------
        debug!(target: "hybrid_search::engine", query, "dual-path retrieval");

        let keyword_fut = async {
            let started = Instant::now();
            let res = self.keyword.search(query, self.cfg.retrieval_k);
            (res, started.elapsed())
        };
        let semantic_fut = async {
            let started = Instant::now();
            let res = self.semantic.query(query, self.cfg.retrieval_k).await;
            (res, started.elapsed())
        };
        let ((keyword_res, keyword_dur), (semantic_res, semantic_dur)) =
            tokio::join!(keyword_fut, semantic_fut);

        stats.keyword_duration_ms = keyword_dur.as_millis() as u64;
        stats.semantic_duration_ms = semantic_dur.as_millis() as u64;

        // ---- Phase 2: degradation policy ----------------------------------
        let (keyword_list, keyword_err) = match keyword_res {
            Ok(list) => (list, None),
            Err(e) => {
                warn!(target: "hybrid_search::engine", error = %e, "keyword path failed; degrading");
                stats.keyword_failed = true;
                (Vec::new(), Some(e.to_string()))
            }
        };
        let (semantic_list, semantic_err) = match semantic_res {
            Ok(list) => (list, None),
            Err(e) => {
                warn!(target: "hybrid_search::engine", error = %e, "semantic path failed; degrading");
                stats.semantic_failed = true;
                (Vec::new(), Some(e.to_string()))
            }
        };

        if let (Some(kw), Some(sem)) = (&keyword_err, &semantic_err) {
            return Err(SearchError::AllPathsFailed {
                keyword: kw.clone(),
                semantic: sem.clone(),
            });
        }

        stats.keyword_count = keyword_list.len();
        stats.semantic_count = semantic_list.len();

        // Empty corpus / no matches on either path: empty result, not an error.
        if keyword_list.is_empty() && semantic_list.is_empty() {
            stats.total_duration_ms = t0.elapsed().as_millis() as u64;
            return Ok(SearchContext {
                query: query.to_string(),
                hits: Vec::new(),
                statistics: stats,
            });
        }

        // ---- Phase 3: RRF fusion ------------------------------------------
        let fused = fusion::fuse_two(
            &keyword_list,
            &semantic_list,
            self.cfg.rrf_k,
            self.cfg.fusion_k,
        );
        stats.fused_count = fused.len();
        debug!(
            target: "hybrid_search::engine",
            keyword = keyword_list.len(),
            semantic = semantic_list.len(),
            fused = fused.len(),
            "fusion done"
        );

        // ---- Phase 4: timed rerank with fusion fallback -------------------
        let final_cap = top_k.min(self.cfg.rerank_k);
        let hits = match &self.reranker {
            Some(reranker) if !fused.is_empty() => {
                let started = Instant::now();
                let candidates = self.to_candidates(&fused);
                let outcome = tokio::time::timeout(
                    self.cfg.rerank_timeout,
                    reranker.rerank(query, &candidates, final_cap),
                )
                .await;
                stats.rerank_duration_ms = started.elapsed().as_millis() as u64;

                match outcome {
                    Ok(Ok(reranked)) => {
                        let mut hits = Vec::with_capacity(reranked.len());
                        for (i, entry) in reranked.into_iter().take(final_cap).enumerate() {
                            hits.push(SearchHit {
                                text: self.chunk_text(&entry.chunk_id),
                                chunk_id: entry.chunk_id,
                                score: entry.relevance,
                                method: RetrievalMethod::Rerank,
                                rank: i + 1,
                            });
                        }
                        hits
                    }
                    Ok(Err(e)) => {
                        warn!(target: "hybrid_search::engine", error = %e, "rerank failed; using fusion order");
                        stats.rerank_skipped = true;
                        self.fusion_hits(&fused, final_cap)
                    }
                    Err(_) => {
                        warn!(
                            target: "hybrid_search::engine",
                            timeout_ms = self.cfg.rerank_timeout.as_millis() as u64,
                            "rerank timed out; using fusion order"
                        );
                        stats.rerank_skipped = true;
                        self.fusion_hits(&fused, final_cap)
                    }
                }
            }
            _ => {
                stats.rerank_skipped = true;
                self.fusion_hits(&fused, final_cap)
            }
        };

        stats.final_count = hits.len();
        stats.total_duration_ms = t0.elapsed().as_millis() as u64;

        info!(
            target: "hybrid_search::engine",
            hits = hits.len(),
            degraded = stats.is_degraded(),
            duration_ms = stats.total_duration_ms,
            "search done"
        );

        Ok(SearchContext {
            query: query.to_string(),
            hits,
            statistics: stats,
        })
    }

    fn to_candidates(&self, fused: &[FusedEntry]) -> Vec<RerankCandidate> {
        fused
            .iter()
            .map(|f| RerankCandidate {
                chunk_id: f.chunk_id.clone(),
                text: self.chunk_text(&f.chunk_id),
            })
            .collect()
    }

    fn fusion_hits(&self, fused: &[FusedEntry], cap: usize) -> Vec<SearchHit> {
        fused
            .iter()
            .take(cap)
            .enumerate()
            .map(|(i, f)| SearchHit {
                chunk_id: f.chunk_id.clone(),
                text: self.chunk_text(&f.chunk_id),
                score: f.fused_score,
                method: RetrievalMethod::Fusion,
                rank: i + 1,
            })
            .collect()
    }

    /// Resolves chunk text from the keyword corpus; chunks known only to the
    /// semantic store degrade to an empty body (id still usable for audit).
    fn chunk_text(&self, chunk_id: &str) -> String {
        self.keyword
            .get_chunk(chunk_id)
            .map(|c| c.text.clone())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, RankedEntry};
    use crate::rerank::RerankFuture;
    use crate::semantic::SemanticFuture;

    struct FixedSemantic {
        entries: Vec<RankedEntry>,
    }

    impl SemanticSearch for FixedSemantic {
        fn query<'a>(&'a self, _query: &'a str, k: usize) -> SemanticFuture<'a> {
            let out: Vec<RankedEntry> = self.entries.iter().take(k).cloned().collect();
            Box::pin(async move { Ok(out) })
        }
    }

    struct FailingSemantic;

    impl SemanticSearch for FailingSemantic {
        fn query<'a>(&'a self, _query: &'a str, _k: usize) -> SemanticFuture<'a> {
            Box::pin(async { Err(SearchError::Semantic("store unavailable".into())) })
        }
    }

    /// Reverses the candidate order, so reranked output is distinguishable
    /// from fusion order.
    struct ReversingReranker;

    impl Rerank for ReversingReranker {
        fn rerank<'a>(
            &'a self,
            _query: &'a str,
            candidates: &'a [RerankCandidate],
            top_n: usize,
        ) -> RerankFuture<'a> {
            let out: Vec<crate::models::RerankedEntry> = candidates
                .iter()
                .rev()
                .take(top_n)
                .enumerate()
                .map(|(i, c)| crate::models::RerankedEntry {
                    chunk_id: c.chunk_id.clone(),
                    relevance: 1.0 - i as f64 * 0.1,
                })
                .collect();
            Box::pin(async move { Ok(out) })
        }
    }

    struct StallingReranker;

    impl Rerank for StallingReranker {
        fn rerank<'a>(
            &'a self,
            _query: &'a str,
            _candidates: &'a [RerankCandidate],
            _top_n: usize,
        ) -> RerankFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            })
        }
    }

    fn corpus_index() -> Arc<KeywordIndex> {
        let mut index = KeywordIndex::default();
        index.index_documents(vec![
            chunk("c1", "termination requires thirty days written notice"),
            chunk("c2", "liability is capped at the fees paid"),
            chunk("c3", "confidentiality survives termination of this agreement"),
        ]);
        Arc::new(index)
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            token_count: text.len() / 4,
            source_document_id: "doc".to_string(),
        }
    }

    fn ranked(id: &str, rank: usize) -> RankedEntry {
        RankedEntry {
            chunk_id: id.to_string(),
            rank,
            score: 0.9 / rank as f64,
        }
    }

    fn engine(
        semantic: Arc<dyn SemanticSearch>,
        reranker: Option<Arc<dyn Rerank>>,
    ) -> HybridSearchEngine {
        let cfg = HybridSearchConfig {
            rerank_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        HybridSearchEngine::new(corpus_index(), semantic, reranker, cfg)
    }

    #[tokio::test]
    async fn semantic_failure_degrades_to_keyword_only() {
        let engine = engine(Arc::new(FailingSemantic), None);
        let ctx = engine.search("termination notice", 10).await.unwrap();
        assert!(ctx.has_results());
        assert!(ctx.statistics.semantic_failed);
        assert!(!ctx.statistics.keyword_failed);
        assert!(ctx.statistics.is_degraded());
        assert_eq!(ctx.hits[0].chunk_id, "c1");
    }

    #[tokio::test]
    async fn both_paths_failing_is_fatal() {
        // Unbuilt keyword index errors, and the semantic path errors too.
        let cfg = HybridSearchConfig::default();
        let engine = HybridSearchEngine::new(
            Arc::new(KeywordIndex::default()),
            Arc::new(FailingSemantic),
            None,
            cfg,
        );
        let err = engine.search("anything", 10).await.unwrap_err();
        assert!(matches!(err, SearchError::AllPathsFailed { .. }));
    }

    #[tokio::test]
    async fn empty_corpus_is_empty_result_not_error() {
        let mut index = KeywordIndex::default();
        index.index_documents(Vec::new());
        let engine = HybridSearchEngine::new(
            Arc::new(index),
            Arc::new(FixedSemantic { entries: vec![] }),
            None,
            HybridSearchConfig::default(),
        );
        let ctx = engine.search("anything", 10).await.unwrap();
        assert!(!ctx.has_results());
    }

    #[tokio::test]
    async fn rerank_reorders_the_fused_candidates() {
        let semantic = Arc::new(FixedSemantic {
            entries: vec![ranked("c2", 1), ranked("c3", 2)],
        });
        let engine = engine(semantic, Some(Arc::new(ReversingReranker)));
        let ctx = engine.search("termination liability", 10).await.unwrap();
        assert!(!ctx.statistics.rerank_skipped);
        assert!(ctx.hits.iter().all(|h| h.method == RetrievalMethod::Rerank));
        // Reranked order differs from fusion order (reversed).
        let fusion_only = engine_without_reranker_order().await;
        let reranked: Vec<&str> = ctx.hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(
            reranked,
            fusion_only.iter().rev().map(|s| s.as_str()).collect::<Vec<_>>()
        );
    }

    async fn engine_without_reranker_order() -> Vec<String> {
        let semantic = Arc::new(FixedSemantic {
            entries: vec![ranked("c2", 1), ranked("c3", 2)],
        });
        let engine = engine(semantic, None);
        let ctx = engine.search("termination liability", 10).await.unwrap();
        ctx.hits.into_iter().map(|h| h.chunk_id).collect()
    }

    #[tokio::test]
    async fn rerank_timeout_falls_back_to_fusion_order() {
        let semantic = Arc::new(FixedSemantic {
            entries: vec![ranked("c2", 1)],
        });
        let engine = engine(semantic, Some(Arc::new(StallingReranker)));
        let ctx = engine.search("liability cap", 10).await.unwrap();
        assert!(ctx.statistics.rerank_skipped);
        assert!(ctx.has_results());
        assert!(ctx.hits.iter().all(|h| h.method == RetrievalMethod::Fusion));
    }

    #[tokio::test]
    async fn repeated_searches_are_deterministic() {
        let semantic = Arc::new(FixedSemantic {
            entries: vec![ranked("c3", 1), ranked("c1", 2)],
        });
        let engine = engine(semantic, None);
        let first = engine.search("termination", 10).await.unwrap();
        for _ in 0..3 {
            let next = engine.search("termination", 10).await.unwrap();
            let a: Vec<_> = first.hits.iter().map(|h| (&h.chunk_id, h.rank)).collect();
            let b: Vec<_> = next.hits.iter().map(|h| (&h.chunk_id, h.rank)).collect();
            assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn top_k_larger_than_available_returns_all() {
        let semantic = Arc::new(FixedSemantic {
            entries: vec![ranked("c1", 1)],
        });
        let engine = engine(semantic, None);
        let ctx = engine.search("termination notice", 100).await.unwrap();
        assert!(ctx.hits.len() <= engine.config().rerank_k);
        assert!(ctx.has_results());
    }
}
