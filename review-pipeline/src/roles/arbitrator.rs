//! Arbitrator role: consolidates one pass of reviewer feedback.
//!
//! Resolution rules, in priority order:
//! (a) every issue at the highest severity tier present is kept ahead of
//!     any lower tier;
//! (b) among equal severity, domain priority Legal > Risk > Business >
//!     Format breaks ties;
//! (c) a location flagged by more than one reviewer kind has its kept
//!     issue escalated exactly one severity tier (capped at Critical)
//!     before re-ranking;
//! (d) reviewers proposing mutually exclusive fixes for one location are
//!     queued for human review and excluded from automatic revision
//!     instructions — no automatic tie-break is invented.
//!
//! Prioritization, escalation, and conflict resolution are pure functions
//! of the pass's feedback: identical inputs always produce identical
//! consolidation. Only the prose `revision_instructions` touches the
//! generation client, and it falls back to a deterministic rendering when
//! generation fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use llm_service::TextGenerator;

use crate::models::{
    ConflictResolution, ConsolidatedFeedback, ReviewFeedback, ReviewIssue, ReviewerKind, Severity,
    prefixed_id,
};
use crate::prompts;

/// Cap on the deterministic action list handed to the writer.
const MAX_PRIORITY_ACTIONS: usize = 10;

/// Consolidation role; the generator is only used for instruction prose.
pub struct Arbitrator {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Arbitrator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// Merges all feedback of one pass into a single consolidated result.
    ///
    /// `feedbacks` must already be in canonical reviewer order; the
    /// pipeline guarantees that regardless of completion order.
    pub async fn arbitrate(
        &self,
        run_id: &str,
        iteration: u32,
        feedbacks: &[ReviewFeedback],
    ) -> ConsolidatedFeedback {
        let started = Instant::now();

        let (mut prioritized, resolved_conflicts) = consolidate(run_id, iteration, feedbacks);
        sort_prioritized(&mut prioritized);

        let priority_actions = priority_actions(&prioritized);
        let human_review_ids: Vec<String> = prioritized
            .iter()
            .filter(|i| i.needs_human_review)
            .map(|i| i.id.clone())
            .collect();

        let revision_instructions = self
            .instructions(&prioritized, resolved_conflicts.len())
            .await;

        debug!(
            target: "review_pipeline::arbitrator",
            iteration,
            issues = prioritized.len(),
            conflicts = resolved_conflicts.len(),
            human_review = human_review_ids.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "arbitration done"
        );

        ConsolidatedFeedback {
            prioritized_issues: prioritized,
            resolved_conflicts,
            revision_instructions,
            priority_actions,
            human_review_ids,
        }
    }

    async fn instructions(&self, prioritized: &[ReviewIssue], conflicts: usize) -> String {
        if prioritized.is_empty() {
            return "No outstanding findings; the draft stands as written.".to_string();
        }
        if let Some(generator) = &self.generator {
            let prompt = prompts::build_instructions_prompt(prioritized, conflicts);
            match generator.generate(&prompt, None).await {
                Ok(text) if !text.trim().is_empty() => return text.trim().to_string(),
                Ok(_) => warn!(
                    target: "review_pipeline::arbitrator",
                    "empty instruction generation; using fallback"
                ),
                Err(e) => warn!(
                    target: "review_pipeline::arbitrator",
                    error = %e,
                    "instruction generation failed; using fallback"
                ),
            }
        }
        fallback_instructions(prioritized)
    }
}

/* ------------------------------------------------------------------------- */
/* Pure consolidation                                                        */
/* ------------------------------------------------------------------------- */

/// Groups issues by location, resolves cross-reviewer conflicts, and
/// applies the one-tier escalation. Returns the surviving issues (unsorted)
/// plus the conflict records.
fn consolidate(
    run_id: &str,
    iteration: u32,
    feedbacks: &[ReviewFeedback],
) -> (Vec<ReviewIssue>, Vec<ConflictResolution>) {
    // Group while preserving first-seen order for determinism.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ReviewIssue>> = HashMap::new();
    for feedback in feedbacks {
        for issue in &feedback.issues {
            let key = issue.location.key();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(issue.clone());
        }
    }

    let mut kept_issues = Vec::new();
    let mut conflicts = Vec::new();

    for key in order {
        let group = groups.remove(&key).expect("group exists for ordered key");
        let mut kinds: Vec<ReviewerKind> = group.iter().map(|i| i.reviewer_kind).collect();
        kinds.sort_by_key(|k| k.domain_priority());
        kinds.dedup();

        if kinds.len() <= 1 {
            // Same reviewer (or single finding): no conflict, keep as-is.
            kept_issues.extend(group);
            continue;
        }

        // (a)+(b): the kept issue wins by severity, then domain priority.
        let mut kept = group
            .iter()
            .min_by(|a, b| {
                a.severity
                    .rank()
                    .cmp(&b.severity.rank())
                    .then_with(|| {
                        a.reviewer_kind
                            .domain_priority()
                            .cmp(&b.reviewer_kind.domain_priority())
                    })
                    .then_with(|| a.id.cmp(&b.id))
            })
            .expect("group is non-empty")
            .clone();

        // (c): multi-reviewer agreement escalates exactly one tier.
        kept.severity = kept.severity.escalated();

        // (d): mutually exclusive concrete fixes cannot be auto-resolved.
        let needs_human = has_exclusive_fixes(&group);
        kept.needs_human_review = needs_human;

        conflicts.push(ConflictResolution {
            id: prefixed_id("conflict", &format!("{run_id}:{iteration}:{key}")),
            location_key: key.clone(),
            involved: kinds,
            conflicting_issue_ids: group.iter().map(|i| i.id.clone()).collect(),
            kept_issue_id: kept.id.clone(),
            strategy: format!("prioritize_{}", kept.reviewer_kind.as_str()),
            rationale: format!(
                "{} reviewers flagged {key}; kept the {} finding by severity and domain priority",
                group.len(),
                kept.reviewer_kind.as_str()
            ),
            needs_human_review: needs_human,
        });

        kept_issues.push(kept);
    }

    (kept_issues, conflicts)
}

/// Two or more distinct concrete `suggested_fix` values at one location.
fn has_exclusive_fixes(group: &[ReviewIssue]) -> bool {
    let mut fixes: Vec<&str> = group
        .iter()
        .filter_map(|i| i.suggested_fix.as_deref())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    fixes.sort_unstable();
    fixes.dedup();
    fixes.len() > 1
}

/// Total ordering: severity, then domain priority, then location, then id.
fn sort_prioritized(issues: &mut [ReviewIssue]) {
    issues.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| {
                a.reviewer_kind
                    .domain_priority()
                    .cmp(&b.reviewer_kind.domain_priority())
            })
            .then_with(|| a.location.key().cmp(&b.location.key()))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Deterministic action list for the writer: critical and high findings
/// that are not queued for human review.
fn priority_actions(prioritized: &[ReviewIssue]) -> Vec<String> {
    prioritized
        .iter()
        .filter(|i| !i.needs_human_review)
        .filter(|i| matches!(i.severity, Severity::Critical | Severity::High))
        .take(MAX_PRIORITY_ACTIONS)
        .map(|i| match &i.suggested_fix {
            Some(fix) => format!("[{}] {}", i.severity.as_str().to_uppercase(), fix),
            None => format!("[{}] Fix: {}", i.severity.as_str().to_uppercase(), i.title),
        })
        .collect()
}

/// Deterministic instruction prose used when generation is unavailable.
fn fallback_instructions(prioritized: &[ReviewIssue]) -> String {
    let mut lines = vec!["Revise the draft in the following priority order:".to_string()];

    let critical: Vec<&ReviewIssue> = prioritized
        .iter()
        .filter(|i| i.severity == Severity::Critical && !i.needs_human_review)
        .take(5)
        .collect();
    let high: Vec<&ReviewIssue> = prioritized
        .iter()
        .filter(|i| i.severity == Severity::High && !i.needs_human_review)
        .take(5)
        .collect();

    if !critical.is_empty() {
        lines.push("\nMust fix (critical):".to_string());
        for issue in critical {
            lines.push(format!("- {}: {}", issue.title, issue.description));
        }
    }
    if !high.is_empty() {
        lines.push("\nShould fix (high):".to_string());
        for issue in high {
            lines.push(format!("- {}: {}", issue.title, issue.description));
        }
    }

    let queued = prioritized.iter().filter(|i| i.needs_human_review).count();
    if queued > 0 {
        lines.push(format!(
            "\n{queued} finding(s) need a human decision and are excluded from this revision."
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueLocation;
    use chrono::Utc;

    fn issue(
        id: &str,
        kind: ReviewerKind,
        severity: Severity,
        clause: u32,
        fix: Option<&str>,
    ) -> ReviewIssue {
        ReviewIssue {
            id: id.to_string(),
            reviewer_kind: kind,
            severity,
            title: format!("issue {id}"),
            description: "details".into(),
            location: IssueLocation {
                clause_id: Some(clause),
                excerpt: "…".into(),
            },
            suggested_fix: fix.map(str::to_string),
            legal_basis: Vec::new(),
            needs_human_review: false,
        }
    }

    fn feedback(kind: ReviewerKind, issues: Vec<ReviewIssue>) -> ReviewFeedback {
        ReviewFeedback {
            reviewer_kind: kind,
            issues,
            overall_rating: 7.0,
            confidence: 0.9,
            summary: "summary".into(),
            key_findings: Vec::new(),
            cited_chunks: Vec::new(),
            completed_at: Utc::now(),
            duration_ms: 1,
        }
    }

    async fn run(feedbacks: &[ReviewFeedback]) -> ConsolidatedFeedback {
        Arbitrator::new(None).arbitrate("run", 1, feedbacks).await
    }

    #[tokio::test]
    async fn equal_severity_legal_outranks_format() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![issue("a", ReviewerKind::Legal, Severity::High, 1, None)],
            ),
            feedback(
                ReviewerKind::Format,
                vec![issue("b", ReviewerKind::Format, Severity::High, 2, None)],
            ),
        ];
        let out = run(&feedbacks).await;
        assert_eq!(out.prioritized_issues[0].reviewer_kind, ReviewerKind::Legal);
        assert_eq!(out.prioritized_issues[1].reviewer_kind, ReviewerKind::Format);
    }

    #[tokio::test]
    async fn highest_tier_present_comes_first() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![issue("a", ReviewerKind::Legal, Severity::Medium, 1, None)],
            ),
            feedback(
                ReviewerKind::Format,
                vec![issue("b", ReviewerKind::Format, Severity::Critical, 2, None)],
            ),
            feedback(
                ReviewerKind::Risk,
                vec![issue("c", ReviewerKind::Risk, Severity::High, 3, None)],
            ),
        ];
        let out = run(&feedbacks).await;
        let severities: Vec<Severity> =
            out.prioritized_issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium]
        );
    }

    #[tokio::test]
    async fn double_flag_escalates_exactly_one_tier() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![issue("a", ReviewerKind::Legal, Severity::Medium, 4, None)],
            ),
            feedback(
                ReviewerKind::Risk,
                vec![issue("b", ReviewerKind::Risk, Severity::Medium, 4, None)],
            ),
        ];
        let out = run(&feedbacks).await;
        assert_eq!(out.prioritized_issues.len(), 1);
        assert_eq!(out.prioritized_issues[0].severity, Severity::High);
        assert_eq!(out.resolved_conflicts.len(), 1);
    }

    #[tokio::test]
    async fn triple_flag_still_escalates_only_one_tier() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![issue("a", ReviewerKind::Legal, Severity::Low, 4, None)],
            ),
            feedback(
                ReviewerKind::Risk,
                vec![issue("b", ReviewerKind::Risk, Severity::Low, 4, None)],
            ),
            feedback(
                ReviewerKind::Business,
                vec![issue("c", ReviewerKind::Business, Severity::Low, 4, None)],
            ),
        ];
        let out = run(&feedbacks).await;
        assert_eq!(out.prioritized_issues.len(), 1);
        assert_eq!(out.prioritized_issues[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn escalation_caps_at_critical() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![issue("a", ReviewerKind::Legal, Severity::Critical, 2, None)],
            ),
            feedback(
                ReviewerKind::Risk,
                vec![issue("b", ReviewerKind::Risk, Severity::Critical, 2, None)],
            ),
        ];
        let out = run(&feedbacks).await;
        assert_eq!(out.prioritized_issues[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn exclusive_fixes_go_to_human_review() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![issue(
                    "a",
                    ReviewerKind::Legal,
                    Severity::High,
                    5,
                    Some("delete the clause"),
                )],
            ),
            feedback(
                ReviewerKind::Business,
                vec![issue(
                    "b",
                    ReviewerKind::Business,
                    Severity::High,
                    5,
                    Some("extend the clause to 90 days"),
                )],
            ),
        ];
        let out = run(&feedbacks).await;
        assert_eq!(out.prioritized_issues.len(), 1);
        let kept = &out.prioritized_issues[0];
        assert!(kept.needs_human_review);
        assert_eq!(out.human_review_ids, vec![kept.id.clone()]);
        // Excluded from automatic actions despite being critical after escalation.
        assert!(out.priority_actions.is_empty());
        // But the instructions mention the queued decision.
        assert!(out.revision_instructions.contains("human decision"));
    }

    #[tokio::test]
    async fn same_reviewer_at_one_location_is_not_a_conflict() {
        let feedbacks = vec![feedback(
            ReviewerKind::Risk,
            vec![
                issue("a", ReviewerKind::Risk, Severity::Medium, 7, None),
                issue("b", ReviewerKind::Risk, Severity::Low, 7, None),
            ],
        )];
        let out = run(&feedbacks).await;
        assert_eq!(out.prioritized_issues.len(), 2);
        assert!(out.resolved_conflicts.is_empty());
        // No escalation either.
        assert_eq!(out.prioritized_issues[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn arbitration_is_deterministic() {
        let feedbacks = vec![
            feedback(
                ReviewerKind::Legal,
                vec![
                    issue("a", ReviewerKind::Legal, Severity::High, 1, None),
                    issue("b", ReviewerKind::Legal, Severity::Medium, 2, None),
                ],
            ),
            feedback(
                ReviewerKind::Risk,
                vec![issue("c", ReviewerKind::Risk, Severity::High, 1, Some("cap it"))],
            ),
        ];
        let first = run(&feedbacks).await;
        for _ in 0..3 {
            let next = run(&feedbacks).await;
            assert_eq!(
                serde_json::to_string(&next).unwrap(),
                serde_json::to_string(&first).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn empty_pass_produces_standing_instructions() {
        let feedbacks = vec![
            feedback(ReviewerKind::Legal, Vec::new()),
            feedback(ReviewerKind::Risk, Vec::new()),
        ];
        let out = run(&feedbacks).await;
        assert!(out.prioritized_issues.is_empty());
        assert!(out.priority_actions.is_empty());
        assert!(out.revision_instructions.contains("stands"));
    }
}
