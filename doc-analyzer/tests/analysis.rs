//! End-to-end analysis over in-memory collaborators: a real keyword index
//! and fusion, a fixed semantic backend, and a scripted generation client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use doc_analyzer::{AnalysisOutcome, AnalysisStage, AnalyzerConfig, DocAnalyzer};
use hybrid_search::engine::{HybridSearchConfig, HybridSearchEngine};
use hybrid_search::keyword::KeywordIndex;
use hybrid_search::models::{Chunk, RankedEntry};
use hybrid_search::semantic::{SemanticFuture, SemanticSearch};
use llm_service::{GenFuture, LlmError, TextGenerator};
use review_pipeline::{AnalysisType, PipelineConfig, ReviewPipeline, SourceDocument};

const WRITER_JSON: &str = r#"{
    "summary": "Three-clause service agreement; liability needs a cap.",
    "key_clauses": [
        {"clause_id": 1, "title": "Term", "text": "The term is one year.", "assessment": "standard"},
        {"clause_id": 2, "title": "Liability", "text": "Liability is unlimited.", "assessment": "concerning"},
        {"clause_id": 3, "title": "Payment", "text": "Payment is due net 30.", "assessment": "standard"}
    ],
    "assessment": "Workable draft with one open liability question.",
    "risks": ["unlimited liability"],
    "citations": ["c1"]
}"#;

const REVIEW_CLEAN_JSON: &str = r#"{
    "issues": [],
    "overall_rating": 9.0,
    "confidence": 0.95,
    "summary": "No findings.",
    "key_findings": [],
    "citations": ["c2"]
}"#;

struct ScriptedGenerator {
    fail_everything: bool,
}

impl TextGenerator for ScriptedGenerator {
    fn generate<'a>(&'a self, prompt: &'a str, _system: Option<&'a str>) -> GenFuture<'a> {
        let is_writer =
            prompt.starts_with("# Draft analysis task") || prompt.starts_with("# Revision task");
        let is_review = prompt.starts_with("# Review task");
        Box::pin(async move {
            if self.fail_everything {
                return Err(LlmError::Transport("backend down".into()));
            }
            if is_writer {
                return Ok(WRITER_JSON.to_string());
            }
            if is_review {
                return Ok(REVIEW_CLEAN_JSON.to_string());
            }
            Ok("No changes needed.".to_string())
        })
    }
}

struct FixedSemantic;

impl SemanticSearch for FixedSemantic {
    fn query<'a>(&'a self, _query: &'a str, _k: usize) -> SemanticFuture<'a> {
        Box::pin(async {
            Ok(vec![RankedEntry {
                chunk_id: "c2".to_string(),
                rank: 1,
                score: 0.88,
            }])
        })
    }
}

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        token_count: text.len() / 4,
        source_document_id: "doc-1".to_string(),
    }
}

fn engine() -> Arc<HybridSearchEngine> {
    let mut index = KeywordIndex::default();
    index.index_documents(vec![
        chunk("c1", "termination requires thirty days written notice before the anniversary"),
        chunk("c2", "liability is capped at the total fees paid in the preceding year"),
        chunk("c3", "payment obligations survive termination of the agreement"),
    ]);
    Arc::new(HybridSearchEngine::new(
        Arc::new(index),
        Arc::new(FixedSemantic),
        None,
        HybridSearchConfig::default(),
    ))
}

fn analyzer(fail_generation: bool, cache_dir: PathBuf, timeout: Duration) -> DocAnalyzer {
    let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator {
        fail_everything: fail_generation,
    });
    let pipeline = ReviewPipeline::from_generators(
        Arc::clone(&generator),
        generator,
        PipelineConfig::default(),
    );
    let cfg = AnalyzerConfig {
        end_to_end_timeout: timeout,
        ..Default::default()
    };
    DocAnalyzer::new(engine(), pipeline, cfg).with_cache_dir(cache_dir)
}

fn document() -> SourceDocument {
    let text = "1. Term: one year.\n2. Liability: unlimited.\n3. Payment: net 30.\n";
    SourceDocument {
        id: "doc-1".into(),
        title: "Service Agreement".into(),
        text: text.into(),
        content_hash: doc_analyzer::content_hash(text),
    }
}

fn unique_cache(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("doc-analyzer-it-{tag}-{}", std::process::id()))
}

#[tokio::test]
async fn full_analysis_yields_a_valid_report() {
    let cache = unique_cache("full");
    let analyzer = analyzer(false, cache.clone(), Duration::from_secs(60));

    let outcome = analyzer
        .analyze(&document(), AnalysisType::ContractReview)
        .await
        .unwrap();

    let AnalysisOutcome::Complete(report) = outcome else {
        panic!("expected a complete report");
    };
    assert!((0.0..=10.0).contains(&report.executive_summary.overall_rating));
    assert!((0.0..=1.0).contains(&report.detailed_analysis.compliance_rate));
    assert_eq!(report.detailed_analysis.total_clauses, 3);
    // A clean review pass converges in one iteration.
    assert_eq!(report.iterations, 1);
    // The writer's citation of c1 resolves against the retrieval context.
    assert!(
        report
            .evidence_sources
            .iter()
            .any(|s| s.source_id == "c1" && s.cited_by == "writer:v1")
    );

    let _ = tokio::fs::remove_dir_all(&cache).await;
}

#[tokio::test]
async fn identical_request_is_served_from_cache() {
    let cache = unique_cache("memo");

    let first = analyzer(false, cache.clone(), Duration::from_secs(60));
    let outcome = first
        .analyze(&document(), AnalysisType::ContractReview)
        .await
        .unwrap();
    assert!(matches!(outcome, AnalysisOutcome::Complete(_)));

    // Same request with every collaborator down: only a cache hit can
    // produce a complete report.
    let second = analyzer(true, cache.clone(), Duration::from_secs(60));
    let outcome = second
        .analyze(&document(), AnalysisType::ContractReview)
        .await
        .unwrap();
    assert!(matches!(outcome, AnalysisOutcome::Complete(_)));

    // A different analysis type is a different key and must fail without
    // its collaborators.
    let miss = second
        .analyze(&document(), AnalysisType::RiskAssessment)
        .await;
    assert!(miss.is_err());

    let _ = tokio::fs::remove_dir_all(&cache).await;
}

#[tokio::test]
async fn exhausted_budget_returns_a_tagged_partial() {
    let cache = unique_cache("partial");
    let analyzer = analyzer(false, cache.clone(), Duration::ZERO);

    let outcome = analyzer
        .analyze(&document(), AnalysisType::ContractReview)
        .await
        .unwrap();

    let AnalysisOutcome::Partial(partial) = outcome else {
        panic!("expected a partial outcome");
    };
    assert_eq!(partial.interrupted_stage, AnalysisStage::Retrieval);
    assert!(partial.run.is_none());

    let _ = tokio::fs::remove_dir_all(&cache).await;
}
