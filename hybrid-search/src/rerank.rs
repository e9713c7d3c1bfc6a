//! Precision reranking seam and the HTTP production client.
//!
//! The reranker reorders a small fused candidate set with a higher-cost
//! relevance model. It is strictly optional: the engine enforces a bounded
//! timeout around every call and falls back to the fusion ordering on
//! timeout or failure, so a reranker outage can never fail a search.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::models::RerankedEntry;

/// One candidate handed to the reranker: the chunk id plus its text.
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub chunk_id: String,
    pub text: String,
}

/// Boxed future alias for the rerank seam.
pub type RerankFuture<'a> = Pin<Box<dyn Future<Output = SearchResult<Vec<RerankedEntry>>> + Send + 'a>>;

/// Precision reordering of a candidate set against a query.
pub trait Rerank: Send + Sync {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [RerankCandidate],
        top_n: usize,
    ) -> RerankFuture<'a>;
}

/// HTTP reranker client for a `/v1/rerank`-style API (Jina-compatible).
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpReranker {
    /// Builds the client with a caller-specified request timeout.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> SearchResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| SearchError::Rerank(format!("invalid api key header: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn run_rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        top_n: usize,
    ) -> SearchResult<Vec<RerankedEntry>> {
        let body = RerankRequest {
            model: &self.model,
            query,
            documents: candidates
                .iter()
                .map(|c| RerankDocument { text: &c.text })
                .collect(),
            top_n,
        };

        debug!(
            target: "hybrid_search::rerank",
            candidates = candidates.len(),
            top_n,
            "POST {}", self.endpoint
        );

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(240).collect();
            return Err(SearchError::Rerank(format!("HTTP {status}: {snippet}")));
        }

        let out: RerankResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::Rerank(format!("decode: {e}")))?;

        let mut entries = Vec::with_capacity(out.results.len());
        for item in out.results {
            let candidate = candidates.get(item.index).ok_or_else(|| {
                SearchError::Rerank(format!(
                    "provider returned index {} for {} candidates",
                    item.index,
                    candidates.len()
                ))
            })?;
            entries.push(RerankedEntry {
                chunk_id: candidate.chunk_id.clone(),
                relevance: item.relevance_score,
            });
        }
        Ok(entries)
    }
}

impl Rerank for HttpReranker {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        candidates: &'a [RerankCandidate],
        top_n: usize,
    ) -> RerankFuture<'a> {
        Box::pin(self.run_rerank(query, candidates, top_n))
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<RerankDocument<'a>>,
    top_n: usize,
}

#[derive(Debug, Serialize)]
struct RerankDocument<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}
