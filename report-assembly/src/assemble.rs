//! Pure assembly of the three-tier report from a finished pipeline run.
//!
//! All three tiers are computed from the same underlying facts — the final
//! draft, the final pass's prioritized issues, and the retrieval context —
//! without recomputing anything twice. The report is validated before it is
//! returned; a validation failure is a hard error.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tracing::debug;

use hybrid_search::{SearchContext, SearchHit};
use review_pipeline::{
    AnalysisType, Draft, PipelineRun, ReviewIssue, Severity, SourceDocument,
};

use crate::errors::{AssemblyError, AssemblyResult};
use crate::schema::{
    AnalysisReport, ClauseAnalysis, DetailedAnalysis, EvidenceSource, ExecutiveSummary,
    MAX_CRITICAL_ISSUES, MAX_KEY_RISKS, QuickRecommendation,
};

/// Severity weights for the rating aggregate.
fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 3.0,
        Severity::High => 2.0,
        Severity::Medium => 1.0,
        Severity::Low => 0.5,
        Severity::Info => 0.1,
    }
}

/// Builds the complete report from a finished run.
///
/// Fails only on structural validation (missing final draft, out-of-range
/// aggregate) — never on content.
pub fn assemble(
    document: &SourceDocument,
    analysis_type: AnalysisType,
    run: &PipelineRun,
    context: &SearchContext,
) -> AssemblyResult<AnalysisReport> {
    let final_draft = run
        .draft_history
        .last()
        .ok_or(AssemblyError::MissingField("final draft"))?;

    // Unresolved issues of the final pass; an empty history means the run
    // converged before arbitration ever saw an issue.
    let final_issues: &[ReviewIssue] = run
        .feedback_history
        .last()
        .map(|f| f.prioritized_issues.as_slice())
        .unwrap_or(&[]);

    let executive_summary = executive_summary(document, analysis_type, final_draft, final_issues);
    let detailed_analysis = detailed_analysis(final_draft, final_issues);
    let evidence_sources = evidence_sources(run, context);

    let report = AnalysisReport {
        document_id: document.id.clone(),
        document_name: document.title.clone(),
        document_hash: document.content_hash.clone(),
        analysis_type: analysis_type.as_str().to_string(),
        generated_at: Utc::now(),
        iterations: run.iteration,
        executive_summary,
        detailed_analysis,
        evidence_sources,
    };

    report.validate()?;

    debug!(
        target: "report_assembly::assemble",
        document = %report.document_id,
        rating = report.executive_summary.overall_rating,
        clauses = report.detailed_analysis.total_clauses,
        evidence = report.evidence_sources.len(),
        "report assembled"
    );

    Ok(report)
}

/* ------------------------------------------------------------------------- */
/* Tier 1: executive summary                                                 */
/* ------------------------------------------------------------------------- */

fn executive_summary(
    document: &SourceDocument,
    analysis_type: AnalysisType,
    final_draft: &Draft,
    final_issues: &[ReviewIssue],
) -> ExecutiveSummary {
    let mut risk_summary: BTreeMap<String, usize> = BTreeMap::new();
    for issue in final_issues {
        *risk_summary
            .entry(issue.severity.as_str().to_string())
            .or_insert(0) += 1;
    }

    // The prioritized list is already ordered by severity (and recency is
    // uniform within a pass), so the head of the list is the top risk set.
    let key_risks: Vec<String> = final_issues
        .iter()
        .take(MAX_KEY_RISKS)
        .map(|i| i.title.clone())
        .collect();

    let critical_issues: Vec<String> = final_issues
        .iter()
        .filter(|i| i.severity == Severity::Critical)
        .take(MAX_CRITICAL_ISSUES)
        .map(|i| i.title.clone())
        .collect();

    let quick_recommendations: Vec<QuickRecommendation> = final_issues
        .iter()
        .filter(|i| !i.needs_human_review)
        .take(10)
        .map(|i| QuickRecommendation {
            priority: i.severity,
            action: i
                .suggested_fix
                .clone()
                .unwrap_or_else(|| format!("Address: {}", i.title)),
            urgency: match i.severity {
                Severity::Critical => "immediate".to_string(),
                Severity::High => "soon".to_string(),
                _ => "optional".to_string(),
            },
        })
        .collect();

    let overall_rating = overall_rating(final_issues);

    ExecutiveSummary {
        document_title: document.title.clone(),
        analysis_type: analysis_type.as_str().to_string(),
        analysis_date: Utc::now(),
        overall_rating,
        rating_explanation: rating_explanation(final_issues, overall_rating),
        risk_summary,
        key_risks,
        critical_issues,
        quick_recommendations,
        one_sentence_summary: final_draft.summary.clone(),
    }
}

/// 10.0 minus severity weights over unresolved final-pass issues, clamped
/// into [0,10].
fn overall_rating(final_issues: &[ReviewIssue]) -> f64 {
    let penalty: f64 = final_issues.iter().map(|i| severity_weight(i.severity)).sum();
    (10.0 - penalty).clamp(0.0, 10.0)
}

fn rating_explanation(final_issues: &[ReviewIssue], rating: f64) -> String {
    if final_issues.is_empty() {
        return "No unresolved findings after the final review pass.".to_string();
    }
    let critical = final_issues
        .iter()
        .filter(|i| i.severity == Severity::Critical)
        .count();
    let high = final_issues
        .iter()
        .filter(|i| i.severity == Severity::High)
        .count();
    format!(
        "{:.1}/10 after weighting {} unresolved finding(s) ({} critical, {} high).",
        rating,
        final_issues.len(),
        critical,
        high
    )
}

/* ------------------------------------------------------------------------- */
/* Tier 2: detailed analysis                                                 */
/* ------------------------------------------------------------------------- */

fn detailed_analysis(final_draft: &Draft, final_issues: &[ReviewIssue]) -> DetailedAnalysis {
    let mut clause_breakdown = Vec::with_capacity(final_draft.key_clauses.len());
    let mut clauses_with_issues = 0usize;

    for clause in &final_draft.key_clauses {
        let clause_issues: Vec<&ReviewIssue> = final_issues
            .iter()
            .filter(|i| i.location.clause_id == Some(clause.clause_id))
            .collect();

        let risk_level = clause_issues
            .iter()
            .map(|i| i.severity)
            .min_by_key(|s| s.rank())
            .unwrap_or(Severity::Info);

        if !clause_issues.is_empty() {
            clauses_with_issues += 1;
        }

        clause_breakdown.push(ClauseAnalysis {
            clause_id: clause.clause_id,
            clause_title: clause.title.clone(),
            clause_text: clause.text.clone(),
            risk_level,
            issues_identified: clause_issues.iter().map(|i| i.description.clone()).collect(),
            suggestions: clause_issues
                .iter()
                .filter_map(|i| i.suggested_fix.clone())
                .collect(),
        });
    }

    let total_clauses = clause_breakdown.len();
    // A clauseless document has nothing that can be non-compliant.
    let compliance_rate = if total_clauses == 0 {
        1.0
    } else {
        (total_clauses - clauses_with_issues) as f64 / total_clauses as f64
    };

    let special_considerations: Vec<String> = final_issues
        .iter()
        .filter(|i| i.needs_human_review)
        .map(|i| format!("Needs human review: {}", i.title))
        .collect();

    DetailedAnalysis {
        total_clauses,
        clauses_with_issues,
        compliance_rate,
        clause_breakdown,
        special_considerations,
    }
}

/* ------------------------------------------------------------------------- */
/* Tier 3: evidence sources                                                  */
/* ------------------------------------------------------------------------- */

/// Every retrieval result actually cited by the writer or a reviewer,
/// grouped by who cited it, preserving the reasoning chain order: drafts in
/// version order first, then each pass's reviewers in canonical order.
fn evidence_sources(run: &PipelineRun, context: &SearchContext) -> Vec<EvidenceSource> {
    let mut sources = Vec::new();

    for draft in &run.draft_history {
        let citer = format!("writer:v{}", draft.version);
        push_citations(&mut sources, &citer, &draft.cited_chunks, context);
    }

    for (pass_idx, pass) in run.review_history.iter().enumerate() {
        for feedback in pass {
            let citer = format!("{}:pass{}", feedback.reviewer_kind.as_str(), pass_idx + 1);
            push_citations(&mut sources, &citer, &feedback.cited_chunks, context);
        }
    }

    sources
}

fn push_citations(
    sources: &mut Vec<EvidenceSource>,
    citer: &str,
    cited: &[String],
    context: &SearchContext,
) {
    let mut seen: HashSet<&str> = HashSet::new();
    for chunk_id in cited {
        if !seen.insert(chunk_id.as_str()) {
            continue;
        }
        // Citations that do not resolve to an actual retrieval result are
        // dropped: evidence must be verifiable against the context.
        if let Some(hit) = find_hit(context, chunk_id) {
            sources.push(EvidenceSource {
                source_id: hit.chunk_id.clone(),
                content: hit.text.clone(),
                relevance: hit.score,
                retrieval_method: hit.method,
                original_rank: hit.rank,
                cited_by: citer.to_string(),
            });
        }
    }
}

fn find_hit<'a>(context: &'a SearchContext, chunk_id: &str) -> Option<&'a SearchHit> {
    context.hits.iter().find(|h| h.chunk_id == chunk_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hybrid_search::{RetrievalMethod, SearchStatistics};
    use review_pipeline::{
        ConsolidatedFeedback, ReviewFeedback, ReviewerKind, Stage,
    };
    use review_pipeline::models::{IssueLocation, KeyClause};

    fn document() -> SourceDocument {
        SourceDocument {
            id: "doc-1".into(),
            title: "Service Agreement".into(),
            text: "…".into(),
            content_hash: "hash-1".into(),
        }
    }

    fn draft(version: u32, cited: Vec<String>) -> Draft {
        Draft {
            version,
            summary: "Agreement with a liability gap.".into(),
            assessment: "Workable".into(),
            key_clauses: vec![
                KeyClause {
                    clause_id: 1,
                    title: "Term".into(),
                    text: "One year".into(),
                    assessment: "standard".into(),
                },
                KeyClause {
                    clause_id: 2,
                    title: "Liability".into(),
                    text: "Unlimited".into(),
                    assessment: "concerning".into(),
                },
                KeyClause {
                    clause_id: 3,
                    title: "Payment".into(),
                    text: "Net 30".into(),
                    assessment: "standard".into(),
                },
            ],
            risk_indicators: vec!["liability".into()],
            cited_chunks: cited,
            created_at: Utc::now(),
        }
    }

    fn issue(id: &str, severity: Severity, clause: Option<u32>) -> ReviewIssue {
        ReviewIssue {
            id: id.into(),
            reviewer_kind: ReviewerKind::Legal,
            severity,
            title: format!("finding {id}"),
            description: "details".into(),
            location: IssueLocation {
                clause_id: clause,
                excerpt: "…".into(),
            },
            suggested_fix: Some("fix it".into()),
            legal_basis: Vec::new(),
            needs_human_review: false,
        }
    }

    fn consolidated(issues: Vec<ReviewIssue>) -> ConsolidatedFeedback {
        ConsolidatedFeedback {
            prioritized_issues: issues,
            resolved_conflicts: Vec::new(),
            revision_instructions: "…".into(),
            priority_actions: Vec::new(),
            human_review_ids: Vec::new(),
        }
    }

    fn feedback(kind: ReviewerKind, cited: Vec<String>) -> ReviewFeedback {
        ReviewFeedback {
            reviewer_kind: kind,
            issues: Vec::new(),
            overall_rating: 7.0,
            confidence: 0.9,
            summary: "s".into(),
            key_findings: Vec::new(),
            cited_chunks: cited,
            completed_at: Utc::now(),
            duration_ms: 1,
        }
    }

    fn context() -> SearchContext {
        SearchContext {
            query: "liability".into(),
            hits: vec![
                SearchHit {
                    chunk_id: "chunk-1".into(),
                    text: "statute text".into(),
                    score: 0.9,
                    method: RetrievalMethod::Rerank,
                    rank: 1,
                },
                SearchHit {
                    chunk_id: "chunk-2".into(),
                    text: "case law".into(),
                    score: 0.7,
                    method: RetrievalMethod::Rerank,
                    rank: 2,
                },
            ],
            statistics: SearchStatistics::default(),
        }
    }

    fn run_with(issues: Vec<ReviewIssue>) -> PipelineRun {
        PipelineRun {
            run_id: "run_x".into(),
            stage: Stage::Done,
            iteration: 1,
            draft_history: vec![draft(1, vec!["chunk-1".into()])],
            review_history: vec![vec![feedback(ReviewerKind::Legal, vec!["chunk-2".into()])]],
            feedback_history: vec![consolidated(issues)],
        }
    }

    #[test]
    fn rating_and_compliance_stay_in_bounds() {
        let issues = vec![
            issue("a", Severity::Critical, Some(2)),
            issue("b", Severity::High, Some(2)),
        ];
        let report = assemble(
            &document(),
            AnalysisType::ContractReview,
            &run_with(issues),
            &context(),
        )
        .unwrap();
        assert!((0.0..=10.0).contains(&report.executive_summary.overall_rating));
        assert!((0.0..=1.0).contains(&report.detailed_analysis.compliance_rate));
        // 10 - (3 + 2) = 5.
        assert!((report.executive_summary.overall_rating - 5.0).abs() < 1e-9);
        // 2 of 3 clauses clean.
        assert!((report.detailed_analysis.compliance_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn heavy_findings_clamp_rating_at_zero() {
        let issues: Vec<ReviewIssue> = (0..6)
            .map(|i| issue(&format!("i{i}"), Severity::Critical, Some(2)))
            .collect();
        let report = assemble(
            &document(),
            AnalysisType::RiskAssessment,
            &run_with(issues),
            &context(),
        )
        .unwrap();
        assert_eq!(report.executive_summary.overall_rating, 0.0);
    }

    #[test]
    fn clean_run_rates_ten_and_full_compliance() {
        let report = assemble(
            &document(),
            AnalysisType::ContractReview,
            &run_with(Vec::new()),
            &context(),
        )
        .unwrap();
        assert_eq!(report.executive_summary.overall_rating, 10.0);
        assert_eq!(report.detailed_analysis.compliance_rate, 1.0);
        assert!(report.executive_summary.key_risks.is_empty());
    }

    #[test]
    fn clauseless_draft_is_fully_compliant() {
        let mut run = run_with(vec![issue("a", Severity::High, None)]);
        run.draft_history = vec![Draft {
            key_clauses: Vec::new(),
            ..draft(1, Vec::new())
        }];
        let report = assemble(
            &document(),
            AnalysisType::ComplianceCheck,
            &run,
            &context(),
        )
        .unwrap();
        assert_eq!(report.detailed_analysis.total_clauses, 0);
        assert_eq!(report.detailed_analysis.compliance_rate, 1.0);
    }

    #[test]
    fn missing_final_draft_is_a_hard_error() {
        let mut run = run_with(Vec::new());
        run.draft_history.clear();
        let err = assemble(
            &document(),
            AnalysisType::ContractReview,
            &run,
            &context(),
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyError::MissingField("final draft")));
    }

    #[test]
    fn tier_caps_hold_under_many_findings() {
        let issues: Vec<ReviewIssue> = (0..8)
            .map(|i| issue(&format!("i{i}"), Severity::Critical, Some(1)))
            .collect();
        let report = assemble(
            &document(),
            AnalysisType::ContractReview,
            &run_with(issues),
            &context(),
        )
        .unwrap();
        assert!(report.executive_summary.key_risks.len() <= 5);
        assert!(report.executive_summary.critical_issues.len() <= 3);
    }

    #[test]
    fn evidence_preserves_reasoning_chain_order() {
        let report = assemble(
            &document(),
            AnalysisType::ContractReview,
            &run_with(Vec::new()),
            &context(),
        )
        .unwrap();
        let citers: Vec<&str> = report
            .evidence_sources
            .iter()
            .map(|s| s.cited_by.as_str())
            .collect();
        assert_eq!(citers, vec!["writer:v1", "legal:pass1"]);
        assert_eq!(report.evidence_sources[0].source_id, "chunk-1");
        assert_eq!(report.evidence_sources[1].source_id, "chunk-2");
    }

    #[test]
    fn unresolvable_citations_are_dropped() {
        let mut run = run_with(Vec::new());
        run.draft_history = vec![draft(1, vec!["chunk-1".into(), "made-up".into()])];
        let report = assemble(
            &document(),
            AnalysisType::ContractReview,
            &run,
            &context(),
        )
        .unwrap();
        assert!(
            report
                .evidence_sources
                .iter()
                .all(|s| s.source_id != "made-up")
        );
    }
}
