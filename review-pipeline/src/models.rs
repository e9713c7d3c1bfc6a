//! Review data model: severities, reviewer kinds, issues, feedback,
//! consolidation output, versioned drafts, and the per-request run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity tiers, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Total rank; smaller is more severe.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
            Severity::Info => 4,
        }
    }

    /// One tier up, capped at `Critical`.
    pub fn escalated(self) -> Severity {
        match self {
            Severity::Critical | Severity::High => Severity::Critical,
            Severity::Medium => Severity::High,
            Severity::Low => Severity::Medium,
            Severity::Info => Severity::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

/// The four reviewer specializations.
///
/// Only the instructions and the priority tier differ between kinds; the
/// control flow is identical for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerKind {
    Legal,
    Risk,
    Format,
    Business,
}

impl ReviewerKind {
    /// Domain priority for arbitration tie-breaks: Legal > Risk > Business >
    /// Format. Smaller wins.
    pub fn domain_priority(self) -> u8 {
        match self {
            ReviewerKind::Legal => 1,
            ReviewerKind::Risk => 2,
            ReviewerKind::Business => 3,
            ReviewerKind::Format => 4,
        }
    }

    /// Canonical collection order for one review pass; reviewer outputs are
    /// arranged in this order before arbitration regardless of completion
    /// order, so arbitration is reproducible.
    pub const CANONICAL: [ReviewerKind; 4] = [
        ReviewerKind::Legal,
        ReviewerKind::Risk,
        ReviewerKind::Business,
        ReviewerKind::Format,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewerKind::Legal => "legal",
            ReviewerKind::Risk => "risk",
            ReviewerKind::Format => "format",
            ReviewerKind::Business => "business",
        }
    }
}

/// Where an issue lives inside the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocation {
    pub clause_id: Option<u32>,
    /// Short excerpt of the offending text.
    pub excerpt: String,
}

impl IssueLocation {
    /// Identity used for conflict grouping: the clause when known, else the
    /// excerpt itself.
    pub fn key(&self) -> String {
        match self.clause_id {
            Some(id) => format!("clause:{id}"),
            None => format!("excerpt:{}", self.excerpt),
        }
    }
}

/// One finding emitted by a reviewer. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub id: String,
    pub reviewer_kind: ReviewerKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub location: IssueLocation,
    pub suggested_fix: Option<String>,
    #[serde(default)]
    pub legal_basis: Vec<String>,
    /// Set by arbitration when reviewers disagree irreconcilably; such
    /// issues are excluded from automatic revision instructions.
    #[serde(default)]
    pub needs_human_review: bool,
}

/// One reviewer's verdict on one draft version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFeedback {
    pub reviewer_kind: ReviewerKind,
    pub issues: Vec<ReviewIssue>,
    /// 0–10; out-of-range values are a schema violation of the producer.
    pub overall_rating: f64,
    /// 0–1.
    pub confidence: f64,
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Retrieval chunk ids this reviewer actually cited.
    #[serde(default)]
    pub cited_chunks: Vec<String>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ReviewFeedback {
    /// Non-zero issue counts per severity tier, most severe first.
    pub fn issue_count_by_severity(&self) -> Vec<(Severity, usize)> {
        const TIERS: [Severity; 5] = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ];
        TIERS
            .into_iter()
            .map(|tier| (tier, self.issues.iter().filter(|i| i.severity == tier).count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

/// Record of one resolved reviewer conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub id: String,
    pub location_key: String,
    pub involved: Vec<ReviewerKind>,
    /// Ids of all issues merged at this location.
    pub conflicting_issue_ids: Vec<String>,
    pub kept_issue_id: String,
    pub strategy: String,
    pub rationale: String,
    pub needs_human_review: bool,
}

/// Arbitration output for one pass. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedFeedback {
    pub prioritized_issues: Vec<ReviewIssue>,
    pub resolved_conflicts: Vec<ConflictResolution>,
    /// Prose guidance handed to the writer for the next pass.
    pub revision_instructions: String,
    /// Deterministic action list derived from the prioritized issues.
    pub priority_actions: Vec<String>,
    /// Issue ids queued for a human decision.
    pub human_review_ids: Vec<String>,
}

/// One key clause as identified by the writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyClause {
    pub clause_id: u32,
    pub title: String,
    pub text: String,
    pub assessment: String,
}

/// One versioned draft. Revisions create new versions; prior versions are
/// retained on the run for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub version: u32,
    pub summary: String,
    pub assessment: String,
    #[serde(default)]
    pub key_clauses: Vec<KeyClause>,
    #[serde(default)]
    pub risk_indicators: Vec<String>,
    /// Retrieval chunk ids the writer actually cited.
    #[serde(default)]
    pub cited_chunks: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Pipeline stages. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Drafting,
    Reviewing,
    Arbitrating,
    Revising,
    Done,
    Failed,
}

/// Process-scoped state of one pipeline execution. Owned exclusively by the
/// orchestrator for the lifetime of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub stage: Stage,
    /// Current full pass, 1-based; never exceeds the configured maximum.
    pub iteration: u32,
    pub draft_history: Vec<Draft>,
    /// Surviving reviewer feedback per pass, in canonical order.
    pub review_history: Vec<Vec<ReviewFeedback>>,
    /// One consolidation per completed arbitration.
    pub feedback_history: Vec<ConsolidatedFeedback>,
}

impl PipelineRun {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            stage: Stage::Drafting,
            iteration: 1,
            draft_history: Vec::new(),
            review_history: Vec::new(),
            feedback_history: Vec::new(),
        }
    }

    pub fn current_draft(&self) -> Option<&Draft> {
        self.draft_history.last()
    }
}

/// Raw document handed in by the document-source collaborator.
///
/// The pipeline never parses file formats; it receives plain text plus a
/// stable content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub title: String,
    pub text: String,
    pub content_hash: String,
}

/// Requested analysis flavor; drives query generation and prompt focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    ContractReview,
    ComplianceCheck,
    RiskAssessment,
}

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::ContractReview => "contract_review",
            AnalysisType::ComplianceCheck => "compliance_check",
            AnalysisType::RiskAssessment => "risk_assessment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contract_review" => Some(AnalysisType::ContractReview),
            "compliance_check" => Some(AnalysisType::ComplianceCheck),
            "risk_assessment" => Some(AnalysisType::RiskAssessment),
            _ => None,
        }
    }
}

/// Deterministic UUIDv5 from an arbitrary string seed.
pub fn stable_uuid(seed: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
}

/// Short stable id with a readable prefix, e.g. `issue_1f0a9c3b`.
pub fn prefixed_id(prefix: &str, seed: &str) -> String {
    let hex = stable_uuid(seed).simple().to_string();
    format!("{prefix}_{}", &hex[..8])
}
