use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use doc_analyzer::{AnalysisOutcome, AnalyzerConfig, DocAnalyzer};
use hybrid_search::chunk::chunk_document_default;
use hybrid_search::engine::{HybridSearchConfig, HybridSearchEngine};
use hybrid_search::keyword::KeywordIndex;
use hybrid_search::rerank::HttpReranker;
use hybrid_search::semantic::QdrantSemanticSearch;
use llm_service::{LlmProfiles, ProfileHandle, ProfileTier, TextGenerator};
use review_pipeline::{AnalysisType, PipelineConfig, ReviewPipeline, SourceDocument};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file when present.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // Usage: legal-ai-backend <document-path> [analysis-type]
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: legal-ai-backend <document-path> [contract_review|compliance_check|risk_assessment]");
    };
    let analysis_type = match args.next() {
        Some(raw) => AnalysisType::parse(&raw)
            .with_context(|| format!("unknown analysis type: {raw}"))?,
        None => AnalysisType::ContractReview,
    };

    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let title = std::path::Path::new(&path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    let document = SourceDocument {
        id: title.clone(),
        content_hash: doc_analyzer::content_hash(&text),
        title,
        text,
    };

    // Shared model profiles (fast/slow/embedding).
    let svc = Arc::new(LlmProfiles::from_env()?);

    // Keyword index over the document corpus.
    let mut index = KeywordIndex::default();
    index.index_documents(chunk_document_default(&document.id, &document.text));

    // Semantic path against Qdrant (collection mirrors the chunk corpus).
    let qdrant_url =
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6334".to_string());
    let collection =
        std::env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "legal_chunks".to_string());
    let semantic = QdrantSemanticSearch::connect(&qdrant_url, &collection, Arc::clone(&svc))?;

    // Optional reranker; the engine degrades to fusion order without it.
    let reranker = match std::env::var("RERANKER_API_KEY") {
        Ok(api_key) => {
            let endpoint = std::env::var("RERANKER_ENDPOINT")
                .unwrap_or_else(|_| "https://api.jina.ai/v1/rerank".to_string());
            let model = std::env::var("RERANKER_MODEL")
                .unwrap_or_else(|_| "jina-reranker-v1-base-en".to_string());
            Some(Arc::new(HttpReranker::new(
                &endpoint,
                &api_key,
                &model,
                Duration::from_secs(10),
            )?) as Arc<dyn hybrid_search::rerank::Rerank>)
        }
        Err(_) => None,
    };

    let engine = Arc::new(HybridSearchEngine::new(
        Arc::new(index),
        Arc::new(semantic),
        reranker,
        HybridSearchConfig::from_env(),
    ));

    let fast: Arc<dyn TextGenerator> =
        Arc::new(ProfileHandle::new(Arc::clone(&svc), ProfileTier::Fast));
    let slow: Arc<dyn TextGenerator> =
        Arc::new(ProfileHandle::new(Arc::clone(&svc), ProfileTier::Slow));
    let pipeline = ReviewPipeline::from_generators(fast, slow, PipelineConfig::from_env());

    let analyzer = DocAnalyzer::new(engine, pipeline, AnalyzerConfig::from_env());

    match analyzer.analyze(&document, analysis_type).await? {
        AnalysisOutcome::Complete(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AnalysisOutcome::Partial(partial) => {
            tracing::warn!(
                stage = ?partial.interrupted_stage,
                cause = %partial.cause,
                "analysis interrupted; returning partial state"
            );
            if let Some(run) = &partial.run {
                println!("{}", serde_json::to_string_pretty(run)?);
            } else if let Some(context) = &partial.context {
                println!("{}", serde_json::to_string_pretty(context)?);
            }
        }
    }

    Ok(())
}
