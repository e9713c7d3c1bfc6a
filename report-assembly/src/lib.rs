//! Three-tier analysis report: schema, pure assembly, hard validation.
//!
//! The final report serves three audiences from the same underlying facts:
//! - **Executive summary** — decision makers: a single rating, the top
//!   risks, and what must be handled immediately.
//! - **Detailed analysis** — counsel: the full per-clause breakdown with a
//!   compliance rate.
//! - **Evidence sources** — auditors: every retrieval result a role
//!   actually cited, grouped by who cited it, in reasoning order.
//!
//! Assembly is a pure function of the pipeline run plus the retrieval
//! context; it fails only on structural validation (a rating outside
//! [0,10], a compliance rate outside [0,1], a missing required field).
//! A partially valid report is never emitted.

pub mod assemble;
pub mod errors;
pub mod schema;

pub use assemble::assemble;
pub use errors::{AssemblyError, AssemblyResult};
pub use schema::{
    AnalysisReport, ClauseAnalysis, DetailedAnalysis, EvidenceSource, ExecutiveSummary,
    QuickRecommendation,
};
