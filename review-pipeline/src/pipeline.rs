//! The four-stage review state machine.
//!
//! `DRAFTING → REVIEWING → ARBITRATING → REVISING → (DRAFTING | DONE)`,
//! with `FAILED` on unrecoverable stage errors. One full pass is one
//! iteration; the machine is DONE when a pass yields zero prioritized
//! issues or the iteration budget is exhausted — whichever comes first, so
//! termination is guaranteed.
//!
//! Reviewers fan out as independent tasks with per-call timeouts and an
//! explicit join barrier; a failed or timed-out reviewer is recorded as
//! missing feedback for the pass, never a pipeline abort. Surviving
//! feedback is re-ordered canonically before arbitration so the outcome is
//! independent of completion order.
//!
//! An optional deadline (set by the orchestrator's end-to-end timeout) is
//! checked between stages; hitting it hands the run state back so the
//! caller can tag a partial result instead of losing everything.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use hybrid_search::SearchContext;
use llm_service::TextGenerator;

use crate::errors::{PipelineError, PipelineResult};
use crate::models::{
    AnalysisType, ConsolidatedFeedback, Draft, PipelineRun, ReviewFeedback, ReviewerKind,
    SourceDocument, Stage, prefixed_id,
};
use crate::roles::{Arbitrator, Reviewer, Writer};

/// Pipeline knobs with the standard defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum full passes before the run finishes regardless of findings.
    pub max_iterations: u32,
    /// Bound on one reviewer call.
    pub reviewer_timeout: Duration,
    /// Reviewer kinds to run, in canonical order.
    pub enabled_reviewers: Vec<ReviewerKind>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            reviewer_timeout: Duration::from_secs(90),
            enabled_reviewers: ReviewerKind::CANONICAL.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Loads overrides from `REVIEW_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_iterations = std::env::var("REVIEW_MAX_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_iterations);
        let reviewer_timeout = std::env::var("REVIEW_REVIEWER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.reviewer_timeout);
        let enabled_reviewers = std::env::var("REVIEW_ENABLED")
            .ok()
            .map(|raw| {
                ReviewerKind::CANONICAL
                    .into_iter()
                    .filter(|k| raw.split(',').any(|s| s.trim() == k.as_str()))
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.enabled_reviewers);

        Self {
            max_iterations,
            reviewer_timeout,
            enabled_reviewers,
        }
    }
}

/// How one run ended (short of a hard failure).
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Converged or exhausted the iteration budget; the final draft is the
    /// last entry of `draft_history`.
    Done(PipelineRun),
    /// The caller's deadline expired between stages; the run state carries
    /// everything completed so far.
    TimedOut(PipelineRun),
}

/// Writer + reviewers + arbitrator wired together.
pub struct ReviewPipeline {
    writer: Writer,
    reviewers: Vec<Reviewer>,
    arbitrator: Arbitrator,
    cfg: PipelineConfig,
}

impl ReviewPipeline {
    pub fn new(
        writer: Writer,
        reviewers: Vec<Reviewer>,
        arbitrator: Arbitrator,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            writer,
            reviewers,
            arbitrator,
            cfg,
        }
    }

    /// Builds the full team from generation handles: the writer and the
    /// reviewers on the fast tier, instruction prose on the slow tier.
    pub fn from_generators(
        fast: Arc<dyn TextGenerator>,
        slow: Arc<dyn TextGenerator>,
        cfg: PipelineConfig,
    ) -> Self {
        let reviewers = cfg
            .enabled_reviewers
            .iter()
            .map(|kind| Reviewer::new(*kind, Arc::clone(&fast)))
            .collect();
        Self {
            writer: Writer::new(fast),
            reviewers,
            arbitrator: Arbitrator::new(Some(slow)),
            cfg,
        }
    }

    /// Runs the state machine to a terminal state.
    ///
    /// `deadline` is the orchestrator's end-to-end budget; when it expires
    /// between stages the run state is returned as `TimedOut` instead of an
    /// error.
    pub async fn run(
        &self,
        document: &SourceDocument,
        context: &SearchContext,
        analysis_type: AnalysisType,
        deadline: Option<Instant>,
    ) -> PipelineResult<PipelineOutcome> {
        let t0 = Instant::now();
        let run_id = prefixed_id(
            "run",
            &format!("{}:{}", document.content_hash, analysis_type.as_str()),
        );
        let mut run = PipelineRun::new(run_id);
        let mut pending_feedback: Option<ConsolidatedFeedback> = None;

        loop {
            // ---- DRAFTING -------------------------------------------------
            run.stage = Stage::Drafting;
            if expired(deadline) {
                return Ok(PipelineOutcome::TimedOut(run));
            }
            debug!(
                target: "review_pipeline::pipeline",
                run_id = %run.run_id,
                iteration = run.iteration,
                "drafting"
            );
            let draft = match (&pending_feedback, run.current_draft()) {
                (Some(feedback), Some(previous)) => {
                    self.writer.revise(previous, feedback, context).await
                }
                _ => self.writer.draft(document, context, analysis_type).await,
            }
            .map_err(|e| PipelineError::Writer {
                stage: Stage::Drafting,
                cause: e.to_string(),
            })?;
            run.draft_history.push(draft);

            // ---- REVIEWING ------------------------------------------------
            run.stage = Stage::Reviewing;
            if expired(deadline) {
                return Ok(PipelineOutcome::TimedOut(run));
            }
            let current = run
                .draft_history
                .last()
                .cloned()
                .expect("draft pushed in this pass");
            let survivors = self.review_pass(&run.run_id, &current, document, context).await;
            if survivors.is_empty() {
                return Err(PipelineError::AllReviewersFailed {
                    iteration: run.iteration,
                });
            }
            run.review_history.push(survivors);

            // ---- ARBITRATING ----------------------------------------------
            run.stage = Stage::Arbitrating;
            if expired(deadline) {
                return Ok(PipelineOutcome::TimedOut(run));
            }
            let pass_feedback = run
                .review_history
                .last()
                .expect("review pass recorded above");
            let consolidated = self
                .arbitrator
                .arbitrate(&run.run_id, run.iteration, pass_feedback)
                .await;
            run.feedback_history.push(consolidated.clone());

            // ---- REVISING -------------------------------------------------
            run.stage = Stage::Revising;
            let open_issues = consolidated.prioritized_issues.len();
            let budget_spent = run.iteration >= self.cfg.max_iterations;

            if open_issues == 0 || budget_spent {
                run.stage = Stage::Done;
                info!(
                    target: "review_pipeline::pipeline",
                    run_id = %run.run_id,
                    iterations = run.iteration,
                    open_issues,
                    converged = open_issues == 0,
                    duration_ms = t0.elapsed().as_millis() as u64,
                    "pipeline done"
                );
                return Ok(PipelineOutcome::Done(run));
            }

            debug!(
                target: "review_pipeline::pipeline",
                run_id = %run.run_id,
                iteration = run.iteration,
                open_issues,
                "revision needed; next pass"
            );
            run.iteration += 1;
            pending_feedback = Some(consolidated);
        }
    }

    /// Fans out all configured reviewers, joins them, and returns the
    /// survivors in canonical order.
    async fn review_pass(
        &self,
        run_id: &str,
        draft: &Draft,
        document: &SourceDocument,
        context: &SearchContext,
    ) -> Vec<ReviewFeedback> {
        let mut handles = Vec::with_capacity(self.reviewers.len());
        for reviewer in &self.reviewers {
            let reviewer = reviewer.clone();
            let run_id = run_id.to_string();
            let draft = draft.clone();
            let document = document.clone();
            let context = context.clone();
            let timeout = self.cfg.reviewer_timeout;

            let kind = reviewer.kind();
            handles.push((
                kind,
                tokio::spawn(async move {
                    match tokio::time::timeout(
                        timeout,
                        reviewer.review(&run_id, &draft, &document, &context),
                    )
                    .await
                    {
                        Ok(Ok(feedback)) => Some(feedback),
                        Ok(Err(e)) => {
                            warn!(
                                target: "review_pipeline::pipeline",
                                reviewer = kind.as_str(),
                                error = %e,
                                "reviewer failed; recording missing feedback"
                            );
                            None
                        }
                        Err(_) => {
                            warn!(
                                target: "review_pipeline::pipeline",
                                reviewer = kind.as_str(),
                                timeout_ms = timeout.as_millis() as u64,
                                "reviewer timed out; recording missing feedback"
                            );
                            None
                        }
                    }
                }),
            ));
        }

        let mut survivors = Vec::with_capacity(handles.len());
        for (kind, handle) in handles {
            match handle.await {
                Ok(Some(feedback)) => survivors.push(feedback),
                Ok(None) => {}
                Err(e) => warn!(
                    target: "review_pipeline::pipeline",
                    reviewer = kind.as_str(),
                    error = %e,
                    "reviewer task join failed"
                ),
            }
        }

        // Canonical order independent of completion order, so arbitration
        // is reproducible given identical inputs.
        survivors.sort_by_key(|f| f.reviewer_kind.domain_priority());
        for feedback in &survivors {
            debug!(
                target: "review_pipeline::pipeline",
                reviewer = feedback.reviewer_kind.as_str(),
                rating = feedback.overall_rating,
                severity_counts = ?feedback.issue_count_by_severity(),
                "feedback collected"
            );
        }
        survivors
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
