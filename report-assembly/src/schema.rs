//! Report schema: the three tiers plus shared validation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hybrid_search::RetrievalMethod;
use review_pipeline::Severity;

use crate::errors::{AssemblyError, AssemblyResult};

/// Upper bound on key risks in the executive tier.
pub const MAX_KEY_RISKS: usize = 5;
/// Upper bound on must-handle critical issues in the executive tier.
pub const MAX_CRITICAL_ISSUES: usize = 3;

/// One prioritized action for the executive tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickRecommendation {
    pub priority: Severity,
    pub action: String,
    /// "immediate" / "soon" / "optional".
    pub urgency: String,
}

/// Tier 1 — decision-maker view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub document_title: String,
    pub analysis_type: String,
    pub analysis_date: DateTime<Utc>,

    /// Severity-weighted aggregate over unresolved final-pass issues, 0–10.
    pub overall_rating: f64,
    pub rating_explanation: String,

    /// Issue counts per severity tier for the final pass.
    pub risk_summary: BTreeMap<String, usize>,
    /// Top risks by severity then recency; at most [`MAX_KEY_RISKS`].
    pub key_risks: Vec<String>,
    /// Must-handle items; at most [`MAX_CRITICAL_ISSUES`].
    pub critical_issues: Vec<String>,
    pub quick_recommendations: Vec<QuickRecommendation>,

    pub one_sentence_summary: String,
}

/// Per-clause verdict for the detailed tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseAnalysis {
    pub clause_id: u32,
    pub clause_title: String,
    pub clause_text: String,
    /// Worst unresolved severity at this clause; `Info` when clean.
    pub risk_level: Severity,
    pub issues_identified: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Tier 2 — counsel view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    pub total_clauses: usize,
    pub clauses_with_issues: usize,
    /// Clauses without unresolved issues / total clauses, in [0,1].
    pub compliance_rate: f64,
    pub clause_breakdown: Vec<ClauseAnalysis>,
    /// Findings queued for a human decision.
    pub special_considerations: Vec<String>,
}

/// Tier 3 — one cited retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSource {
    pub source_id: String,
    pub content: String,
    /// Provider-defined relevance from the final retrieval ordering.
    pub relevance: f64,
    pub retrieval_method: RetrievalMethod,
    /// 1-based rank the source held in the retrieval ordering.
    pub original_rank: usize,
    /// Who cited it: `writer:v1`, `legal:pass1`, …
    pub cited_by: String,
}

/// The complete three-tier report. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub document_id: String,
    pub document_name: String,
    pub document_hash: String,
    pub analysis_type: String,
    pub generated_at: DateTime<Utc>,
    /// Review passes the pipeline actually ran.
    pub iterations: u32,

    pub executive_summary: ExecutiveSummary,
    pub detailed_analysis: DetailedAnalysis,
    pub evidence_sources: Vec<EvidenceSource>,
}

impl AnalysisReport {
    /// Structural validation; any failure means the report must not be
    /// emitted.
    pub fn validate(&self) -> AssemblyResult<()> {
        if self.document_name.trim().is_empty() {
            return Err(AssemblyError::MissingField("document_name"));
        }
        if self.executive_summary.one_sentence_summary.trim().is_empty() {
            return Err(AssemblyError::MissingField("one_sentence_summary"));
        }

        let rating = self.executive_summary.overall_rating;
        if !rating.is_finite() || !(0.0..=10.0).contains(&rating) {
            return Err(AssemblyError::OutOfRange {
                field: "overall_rating",
                value: rating,
                min: 0.0,
                max: 10.0,
            });
        }

        let compliance = self.detailed_analysis.compliance_rate;
        if !compliance.is_finite() || !(0.0..=1.0).contains(&compliance) {
            return Err(AssemblyError::OutOfRange {
                field: "compliance_rate",
                value: compliance,
                min: 0.0,
                max: 1.0,
            });
        }

        if self.executive_summary.key_risks.len() > MAX_KEY_RISKS {
            return Err(AssemblyError::TooMany {
                field: "key_risks",
                max: MAX_KEY_RISKS,
                actual: self.executive_summary.key_risks.len(),
            });
        }
        if self.executive_summary.critical_issues.len() > MAX_CRITICAL_ISSUES {
            return Err(AssemblyError::TooMany {
                field: "critical_issues",
                max: MAX_CRITICAL_ISSUES,
                actual: self.executive_summary.critical_issues.len(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_report() -> AnalysisReport {
        AnalysisReport {
            document_id: "doc".into(),
            document_name: "Agreement".into(),
            document_hash: "hash".into(),
            analysis_type: "contract_review".into(),
            generated_at: Utc::now(),
            iterations: 1,
            executive_summary: ExecutiveSummary {
                document_title: "Agreement".into(),
                analysis_type: "contract_review".into(),
                analysis_date: Utc::now(),
                overall_rating: 8.0,
                rating_explanation: "one low finding".into(),
                risk_summary: BTreeMap::new(),
                key_risks: Vec::new(),
                critical_issues: Vec::new(),
                quick_recommendations: Vec::new(),
                one_sentence_summary: "Sound agreement with minor gaps.".into(),
            },
            detailed_analysis: DetailedAnalysis {
                total_clauses: 2,
                clauses_with_issues: 1,
                compliance_rate: 0.5,
                clause_breakdown: Vec::new(),
                special_considerations: Vec::new(),
            },
            evidence_sources: Vec::new(),
        }
    }

    #[test]
    fn valid_report_passes() {
        assert!(minimal_report().validate().is_ok());
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let mut report = minimal_report();
        report.executive_summary.overall_rating = 10.5;
        assert!(matches!(
            report.validate(),
            Err(AssemblyError::OutOfRange { field: "overall_rating", .. })
        ));
    }

    #[test]
    fn compliance_out_of_range_is_rejected() {
        let mut report = minimal_report();
        report.detailed_analysis.compliance_rate = 1.2;
        assert!(report.validate().is_err());
    }

    #[test]
    fn empty_summary_is_rejected() {
        let mut report = minimal_report();
        report.executive_summary.one_sentence_summary = "  ".into();
        assert!(matches!(
            report.validate(),
            Err(AssemblyError::MissingField("one_sentence_summary"))
        ));
    }

    #[test]
    fn tier_cardinality_is_enforced() {
        let mut report = minimal_report();
        report.executive_summary.critical_issues =
            vec!["a".into(), "b".into(), "c".into(), "d".into()];
        assert!(matches!(
            report.validate(),
            Err(AssemblyError::TooMany { field: "critical_issues", .. })
        ));
    }
}
