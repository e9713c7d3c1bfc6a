//! Writer role: produces and revises versioned drafts.
//!
//! The writer is the only role allowed to mutate the analysis, and it never
//! edits in place — every call yields a new `Draft` with `version =
//! previous + 1`. A generation or schema failure here is unrecoverable for
//! the drafting stage.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use hybrid_search::SearchContext;
use llm_service::TextGenerator;

use crate::errors::PipelineResult;
use crate::models::{AnalysisType, ConsolidatedFeedback, Draft, KeyClause, SourceDocument};
use crate::prompts;
use crate::roles::json::parse_structured;

const SYSTEM: &str =
    "You are the drafting specialist of a legal document analysis team. Answer with strict JSON only.";

/// Strict JSON shape expected from the writer model.
#[derive(Debug, Deserialize)]
struct WriterOutput {
    summary: String,
    #[serde(default)]
    key_clauses: Vec<RawClause>,
    assessment: String,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawClause {
    clause_id: u32,
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    assessment: String,
}

/// Draft-producing role bound to a generation handle.
#[derive(Clone)]
pub struct Writer {
    generator: Arc<dyn TextGenerator>,
}

impl Writer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// First-pass draft from the document and retrieved context.
    pub async fn draft(
        &self,
        document: &SourceDocument,
        context: &SearchContext,
        analysis_type: AnalysisType,
    ) -> PipelineResult<Draft> {
        let prompt = prompts::build_draft_prompt(document, context, analysis_type);
        self.generate_draft(&prompt, 1).await
    }

    /// Revision: previous draft plus arbitrated instructions.
    pub async fn revise(
        &self,
        previous: &Draft,
        feedback: &ConsolidatedFeedback,
        context: &SearchContext,
    ) -> PipelineResult<Draft> {
        let prompt = prompts::build_revision_prompt(previous, feedback, context);
        self.generate_draft(&prompt, previous.version + 1).await
    }

    async fn generate_draft(&self, prompt: &str, version: u32) -> PipelineResult<Draft> {
        let started = Instant::now();
        let raw = self.generator.generate(prompt, Some(SYSTEM)).await?;
        let out: WriterOutput = parse_structured("writer", &raw)?;

        debug!(
            target: "review_pipeline::writer",
            version,
            clauses = out.key_clauses.len(),
            risks = out.risks.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "draft generated"
        );

        Ok(Draft {
            version,
            summary: out.summary,
            assessment: out.assessment,
            key_clauses: out
                .key_clauses
                .into_iter()
                .map(|c| KeyClause {
                    clause_id: c.clause_id,
                    title: c.title,
                    text: c.text,
                    assessment: c.assessment,
                })
                .collect(),
            risk_indicators: out.risks,
            cited_chunks: out.citations,
            created_at: Utc::now(),
        })
    }
}
