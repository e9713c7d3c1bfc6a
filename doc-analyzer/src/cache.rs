//! Content-addressed file cache for finished reports (JSON on disk).
//!
//! Why cache?
//! - A full analysis costs several model calls and retrieval round-trips.
//! - Re-running the pipeline on the same `(content_hash, analysis_type)`
//!   should be O(1).
//!
//! Key (stable across re-runs): SHA256("{content_hash}:{analysis_type}")
//! Layout: <root>/<analysis_type>/<hash12>.json
//! Default root: "analysis_data/report_cache" (env-overridable via
//! `ANALYZER_CACHE_DIR`).
//!
//! Concurrent reads are safe (files are immutable once written); a race to
//! populate one key is harmless — values are idempotent for identical
//! inputs, last writer wins.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

use report_assembly::AnalysisReport;
use review_pipeline::AnalysisType;

use crate::errors::CacheError;

/// Returns the cache root directory (env-overridable).
pub fn cache_root() -> PathBuf {
    std::env::var("ANALYZER_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("analysis_data/report_cache"))
}

/// Computes the deterministic cache path for one request.
fn key_path(root: &Path, content_hash: &str, analysis_type: AnalysisType) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", content_hash, analysis_type.as_str()));
    let digest = format!("{:x}", hasher.finalize());
    root.join(analysis_type.as_str())
        .join(format!("{}.json", &digest[..12]))
}

/// Loads a cached report if present.
pub async fn load_report(
    root: &Path,
    content_hash: &str,
    analysis_type: AnalysisType,
) -> Result<Option<AnalysisReport>, CacheError> {
    let path = key_path(root, content_hash, analysis_type);
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(&path).await?;
    let report: AnalysisReport = serde_json::from_slice(&data)?;
    Ok(Some(report))
}

/// Stores a finished report under its content-addressed key.
pub async fn store_report(
    root: &Path,
    content_hash: &str,
    analysis_type: AnalysisType,
    report: &AnalysisReport,
) -> Result<(), CacheError> {
    let path = key_path(root, content_hash, analysis_type);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_vec(report)?;
    fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("report-cache-test-{tag}-{}", std::process::id()))
    }

    fn sample_report() -> AnalysisReport {
        serde_json::from_value(serde_json::json!({
            "document_id": "doc",
            "document_name": "Agreement",
            "document_hash": "hash-1",
            "analysis_type": "contract_review",
            "generated_at": "2026-01-01T00:00:00Z",
            "iterations": 1,
            "executive_summary": {
                "document_title": "Agreement",
                "analysis_type": "contract_review",
                "analysis_date": "2026-01-01T00:00:00Z",
                "overall_rating": 8.0,
                "rating_explanation": "fine",
                "risk_summary": {},
                "key_risks": [],
                "critical_issues": [],
                "quick_recommendations": [],
                "one_sentence_summary": "Sound."
            },
            "detailed_analysis": {
                "total_clauses": 1,
                "clauses_with_issues": 0,
                "compliance_rate": 1.0,
                "clause_breakdown": [],
                "special_considerations": []
            },
            "evidence_sources": []
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn round_trip_hit_on_same_key() {
        let root = unique_root("roundtrip");
        let report = sample_report();

        store_report(&root, "hash-1", AnalysisType::ContractReview, &report)
            .await
            .unwrap();
        let loaded = load_report(&root, "hash-1", AnalysisType::ContractReview)
            .await
            .unwrap()
            .expect("cache hit");
        assert_eq!(loaded.document_hash, "hash-1");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn different_analysis_type_misses() {
        let root = unique_root("type-miss");
        let report = sample_report();

        store_report(&root, "hash-1", AnalysisType::ContractReview, &report)
            .await
            .unwrap();
        let miss = load_report(&root, "hash-1", AnalysisType::RiskAssessment)
            .await
            .unwrap();
        assert!(miss.is_none());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn different_content_hash_misses() {
        let root = unique_root("hash-miss");
        let report = sample_report();

        store_report(&root, "hash-1", AnalysisType::ContractReview, &report)
            .await
            .unwrap();
        let miss = load_report(&root, "hash-2", AnalysisType::ContractReview)
            .await
            .unwrap();
        assert!(miss.is_none());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
