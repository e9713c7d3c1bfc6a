//! Semantic retrieval seam and the Qdrant-backed production client.
//!
//! The engine only sees the [`SemanticSearch`] trait: embed the query, ask
//! the vector store for the nearest chunks, return a 1-based ranked list.
//! The store itself is an external collaborator; this module holds the one
//! production implementation plus the connection helper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::SearchPointsBuilder;
use tracing::debug;

use llm_service::LlmProfiles;

use crate::errors::{SearchError, SearchResult};
use crate::models::RankedEntry;

/// Boxed future alias for the semantic seam.
pub type SemanticFuture<'a> = Pin<Box<dyn Future<Output = SearchResult<Vec<RankedEntry>>> + Send + 'a>>;

/// Nearest-chunk retrieval by vector similarity.
///
/// Implementations must return ranks that are 1-based, strictly increasing,
/// and unique within the list. Async via a boxed future because real
/// backends perform network I/O.
pub trait SemanticSearch: Send + Sync {
    fn query<'a>(&'a self, query: &'a str, k: usize) -> SemanticFuture<'a>;
}

/// Qdrant-backed semantic search: embeds the query through the shared
/// embedding profile, then runs k-NN over the configured collection.
pub struct QdrantSemanticSearch {
    client: Qdrant,
    collection: String,
    svc: Arc<LlmProfiles>,
}

impl QdrantSemanticSearch {
    /// Connects to Qdrant over gRPC. Does not touch any collection.
    pub fn connect(url: &str, collection: &str, svc: Arc<LlmProfiles>) -> SearchResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| SearchError::Semantic(format!("client build: {e}")))?;
        Ok(Self {
            client,
            collection: collection.to_string(),
            svc,
        })
    }

    async fn run_query(&self, query: &str, k: usize) -> SearchResult<Vec<RankedEntry>> {
        let vector = self.svc.embed(query).await?;

        debug!(
            target: "hybrid_search::semantic",
            collection = %self.collection,
            dim = vector.len(),
            k,
            "vector search"
        );

        let resp = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, k as u64).with_payload(false),
            )
            .await
            .map_err(|e| SearchError::Semantic(format!("search_points: {e}")))?;

        // Scored points arrive ordered by similarity; ranks follow position.
        let entries = resp
            .result
            .into_iter()
            .enumerate()
            .map(|(i, sp)| RankedEntry {
                chunk_id: point_id_string(sp.id),
                rank: i + 1,
                score: sp.score as f64,
            })
            .collect();

        Ok(entries)
    }
}

impl SemanticSearch for QdrantSemanticSearch {
    fn query<'a>(&'a self, query: &'a str, k: usize) -> SemanticFuture<'a> {
        Box::pin(self.run_query(query, k))
    }
}

/// Stable string form of a Qdrant point id (UUID or numeric).
fn point_id_string(id: Option<qdrant_client::qdrant::PointId>) -> String {
    match id.and_then(|pid| pid.point_id_options) {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => s,
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}
