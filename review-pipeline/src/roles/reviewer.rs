//! Reviewer role: one polymorphic evaluator, four focus configurations.
//!
//! The four reviewer kinds differ only in their instructions and their
//! arbitration priority — the control flow is identical, so this is a
//! single struct configured by a [`ReviewerProfile`], not four types.
//!
//! A reviewer's structured output is validated on arrival: a rating outside
//! [0,10], a confidence outside [0,1], or malformed issues make that
//! reviewer fail for the pass. The pipeline records the failure and carries
//! on with the survivors.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use hybrid_search::SearchContext;
use llm_service::TextGenerator;

use crate::errors::{PipelineError, PipelineResult};
use crate::models::{
    Draft, IssueLocation, ReviewFeedback, ReviewIssue, ReviewerKind, Severity, SourceDocument,
    prefixed_id,
};
use crate::prompts;
use crate::roles::json::parse_structured;

/// Focus configuration for one reviewer kind.
pub struct ReviewerProfile {
    pub kind: ReviewerKind,
    pub role: &'static str,
    pub instructions: &'static [&'static str],
    pub focus: &'static [&'static str],
}

/// Returns the built-in profile for a reviewer kind.
pub fn profile_for(kind: ReviewerKind) -> &'static ReviewerProfile {
    match kind {
        ReviewerKind::Legal => &LEGAL,
        ReviewerKind::Risk => &RISK,
        ReviewerKind::Format => &FORMAT,
        ReviewerKind::Business => &BUSINESS,
    }
}

static LEGAL: ReviewerProfile = ReviewerProfile {
    kind: ReviewerKind::Legal,
    role: "You are the legal-compliance reviewer of a document analysis team.",
    instructions: &[
        "Check every clause against the cited statutes and the retrieved sources.",
        "Flag missing mandatory clauses and unenforceable terms.",
        "Cite the legal basis for every finding when one exists.",
    ],
    focus: &[
        "statutory compliance",
        "jurisdiction and governing law",
        "mandatory clause coverage",
    ],
};

static RISK: ReviewerProfile = ReviewerProfile {
    kind: ReviewerKind::Risk,
    role: "You are the risk-assessment reviewer of a document analysis team.",
    instructions: &[
        "Assess liability, indemnity, and termination exposure for the client.",
        "Estimate likelihood and impact for each risk you flag.",
        "Prefer concrete mitigations over generic warnings.",
    ],
    focus: &[
        "liability caps and carve-outs",
        "termination and renewal traps",
        "payment and penalty exposure",
    ],
};

static FORMAT: ReviewerProfile = ReviewerProfile {
    kind: ReviewerKind::Format,
    role: "You are the formatting and structure reviewer of a document analysis team.",
    instructions: &[
        "Check numbering, cross-references, and defined-term consistency.",
        "Flag ambiguous wording and missing definitions.",
    ],
    focus: &[
        "clause numbering and references",
        "defined terms",
        "structural completeness",
    ],
};

static BUSINESS: ReviewerProfile = ReviewerProfile {
    kind: ReviewerKind::Business,
    role: "You are the business-logic reviewer of a document analysis team.",
    instructions: &[
        "Check that commercial terms are coherent and achievable.",
        "Flag obligations with no counterpart consideration.",
    ],
    focus: &[
        "pricing and payment schedules",
        "service levels and remedies",
        "commercial balance",
    ],
};

/* ------------------------------------------------------------------------- */
/* Structured output                                                         */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct ReviewerOutput {
    #[serde(default)]
    issues: Vec<RawIssue>,
    overall_rating: f64,
    confidence: f64,
    summary: String,
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    severity: Severity,
    title: String,
    description: String,
    clause_id: Option<u32>,
    #[serde(default)]
    excerpt: String,
    suggested_fix: Option<String>,
    #[serde(default)]
    legal_basis: Vec<String>,
}

/// One reviewer instance bound to a generation handle.
#[derive(Clone)]
pub struct Reviewer {
    kind: ReviewerKind,
    generator: Arc<dyn TextGenerator>,
}

impl Reviewer {
    pub fn new(kind: ReviewerKind, generator: Arc<dyn TextGenerator>) -> Self {
        Self { kind, generator }
    }

    pub fn kind(&self) -> ReviewerKind {
        self.kind
    }

    /// Runs one review pass against the given draft.
    pub async fn review(
        &self,
        run_id: &str,
        draft: &Draft,
        document: &SourceDocument,
        context: &SearchContext,
    ) -> PipelineResult<ReviewFeedback> {
        let started = Instant::now();
        let profile = profile_for(self.kind);
        let prompt = prompts::build_review_prompt(profile, draft, document, context);
        let system = format!(
            "{} Answer with strict JSON only.",
            profile.role
        );

        let raw = self.generator.generate(&prompt, Some(&system)).await?;
        let out: ReviewerOutput = parse_structured("reviewer", &raw)?;
        validate(&out)?;

        let issues = out
            .issues
            .into_iter()
            .enumerate()
            .map(|(i, raw)| ReviewIssue {
                id: prefixed_id(
                    "issue",
                    &format!("{run_id}:{}:{}:{i}", self.kind.as_str(), draft.version),
                ),
                reviewer_kind: self.kind,
                severity: raw.severity,
                title: raw.title,
                description: raw.description,
                location: IssueLocation {
                    clause_id: raw.clause_id,
                    excerpt: raw.excerpt,
                },
                suggested_fix: raw.suggested_fix,
                legal_basis: raw.legal_basis,
                needs_human_review: false,
            })
            .collect::<Vec<_>>();

        debug!(
            target: "review_pipeline::reviewer",
            kind = self.kind.as_str(),
            draft_version = draft.version,
            issues = issues.len(),
            rating = out.overall_rating,
            duration_ms = started.elapsed().as_millis() as u64,
            "review pass done"
        );

        Ok(ReviewFeedback {
            reviewer_kind: self.kind,
            issues,
            overall_rating: out.overall_rating,
            confidence: out.confidence,
            summary: out.summary,
            key_findings: out.key_findings,
            cited_chunks: out.citations,
            completed_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Schema bounds: rating 0–10, confidence 0–1.
fn validate(out: &ReviewerOutput) -> PipelineResult<()> {
    if !(0.0..=10.0).contains(&out.overall_rating) || !out.overall_rating.is_finite() {
        return Err(PipelineError::Schema {
            role: "reviewer",
            detail: format!("overall_rating {} outside [0,10]", out.overall_rating),
        });
    }
    if !(0.0..=1.0).contains(&out.confidence) || !out.confidence.is_finite() {
        return Err(PipelineError::Schema {
            role: "reviewer",
            detail: format!("confidence {} outside [0,1]", out.confidence),
        });
    }
    Ok(())
}
