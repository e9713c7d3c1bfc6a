//! Prompt builders for the writer, reviewer, and arbitrator roles.
//!
//! Keep prompts compact; every role is told to answer with a single strict
//! JSON object so the output can be parsed without scraping.

use hybrid_search::SearchContext;

use crate::models::{AnalysisType, ConsolidatedFeedback, Draft, ReviewIssue, SourceDocument};
use crate::roles::reviewer::ReviewerProfile;

/// Upper bound on document text embedded into a prompt.
const DOC_EXCERPT_CHARS: usize = 3000;

/// First-pass draft prompt: document + retrieved context.
pub fn build_draft_prompt(
    document: &SourceDocument,
    context: &SearchContext,
    analysis_type: AnalysisType,
) -> String {
    let mut s = String::new();
    s.push_str("# Draft analysis task\n");
    s.push_str("You draft the initial analysis of a legal document for a review team.\n");
    s.push_str("Stay objective; flag uncertainty instead of guessing; do not make final judgements.\n");
    s.push_str(&format!(
        "\n## Document\n- id: {}\n- title: {}\n- analysis type: {}\n",
        document.id,
        document.title,
        analysis_type.as_str()
    ));
    s.push_str("\n## Document text\n");
    s.push_str(&excerpt(&document.text, DOC_EXCERPT_CHARS));
    s.push_str("\n\n## Retrieved sources\n");
    s.push_str(&context.to_prompt_block());
    s.push_str(
        "\n\n## Output\nRespond with a single JSON object:\n\
         {\"summary\": str, \"key_clauses\": [{\"clause_id\": int, \"title\": str, \"text\": str, \"assessment\": str}], \
         \"assessment\": str, \"risks\": [str], \"citations\": [source ids you actually used]}\n",
    );
    s
}

/// Revision prompt: previous draft + consolidated instructions.
pub fn build_revision_prompt(
    previous: &Draft,
    feedback: &ConsolidatedFeedback,
    context: &SearchContext,
) -> String {
    let mut s = String::new();
    s.push_str("# Revision task\n");
    s.push_str("Revise the draft below according to the arbitrated instructions. Keep what was right.\n");
    s.push_str(&format!("\n## Previous draft (v{})\n", previous.version));
    s.push_str(&format!("Summary: {}\n", previous.summary));
    s.push_str(&format!("Assessment: {}\n", previous.assessment));
    for clause in &previous.key_clauses {
        s.push_str(&format!(
            "- clause {}: {} — {}\n",
            clause.clause_id, clause.title, clause.assessment
        ));
    }
    s.push_str("\n## Revision instructions\n");
    s.push_str(&feedback.revision_instructions);
    if !feedback.priority_actions.is_empty() {
        s.push_str("\n\n## Priority actions\n");
        for action in &feedback.priority_actions {
            s.push_str(&format!("- {action}\n"));
        }
    }
    s.push_str("\n## Retrieved sources\n");
    s.push_str(&context.to_prompt_block());
    s.push_str(
        "\n\n## Output\nRespond with a single JSON object:\n\
         {\"summary\": str, \"key_clauses\": [{\"clause_id\": int, \"title\": str, \"text\": str, \"assessment\": str}], \
         \"assessment\": str, \"risks\": [str], \"citations\": [source ids you actually used]}\n",
    );
    s
}

/// Specialized review prompt for one reviewer kind.
pub fn build_review_prompt(
    profile: &ReviewerProfile,
    draft: &Draft,
    document: &SourceDocument,
    context: &SearchContext,
) -> String {
    let mut s = String::new();
    s.push_str(&format!("# Review task ({})\n", profile.kind.as_str()));
    s.push_str(profile.role);
    s.push('\n');
    for line in profile.instructions {
        s.push_str("- ");
        s.push_str(line);
        s.push('\n');
    }
    s.push_str("\nFocus areas:\n");
    for area in profile.focus {
        s.push_str("- ");
        s.push_str(area);
        s.push('\n');
    }
    s.push_str(&format!("\n## Draft under review (v{})\n", draft.version));
    s.push_str(&format!("Summary: {}\n", draft.summary));
    s.push_str(&format!("Assessment: {}\n", draft.assessment));
    for clause in &draft.key_clauses {
        s.push_str(&format!(
            "- clause {}: {} — {}\n  text: {}\n",
            clause.clause_id,
            clause.title,
            clause.assessment,
            excerpt(&clause.text, 300)
        ));
    }
    s.push_str(&format!(
        "\n## Source document: {}\n{}\n",
        document.title,
        excerpt(&document.text, DOC_EXCERPT_CHARS)
    ));
    s.push_str("\n## Retrieved sources\n");
    s.push_str(&context.to_prompt_block());
    s.push_str(
        "\n\n## Output\nRespond with a single JSON object:\n\
         {\"issues\": [{\"severity\": \"critical|high|medium|low|info\", \"title\": str, \"description\": str, \
         \"clause_id\": int?, \"excerpt\": str, \"suggested_fix\": str?, \"legal_basis\": [str]}], \
         \"overall_rating\": number 0-10, \"confidence\": number 0-1, \"summary\": str, \
         \"key_findings\": [str], \"citations\": [source ids you actually used]}\n",
    );
    s
}

/// Prompt asking the slow model to phrase revision guidance from the
/// already-prioritized issue list.
pub fn build_instructions_prompt(prioritized: &[ReviewIssue], conflicts: usize) -> String {
    let critical: Vec<&ReviewIssue> = prioritized
        .iter()
        .filter(|i| i.severity == crate::models::Severity::Critical)
        .take(5)
        .collect();
    let high: Vec<&ReviewIssue> = prioritized
        .iter()
        .filter(|i| i.severity == crate::models::Severity::High)
        .take(5)
        .collect();

    let mut s = String::new();
    s.push_str("# Revision guidance task\n");
    s.push_str("Turn the prioritized findings below into clear, actionable revision guidance for the draft writer.\n");
    s.push_str(&format!(
        "\n## Findings\n- total: {}\n- critical: {}\n- high: {}\n- conflicts resolved: {}\n",
        prioritized.len(),
        critical.len(),
        high.len(),
        conflicts
    ));
    for issue in critical.iter().chain(high.iter()) {
        s.push_str(&format!(
            "- [{}] {}: {}\n",
            issue.severity.as_str().to_uppercase(),
            issue.title,
            issue.description
        ));
    }
    s.push_str(
        "\n## Output\nWrite concise prose guidance: overall strategy, main directions, order of work. Plain text.\n",
    );
    s
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect::<String>() + "…"
}
