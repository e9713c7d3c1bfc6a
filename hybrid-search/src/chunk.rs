//! Document chunking: stable, overlapping line windows over raw text.
//!
//! Chunks are created once at indexing time and never mutated. Ids are
//! content-derived (blake3 over document id, window order, and text) so
//! re-indexing the same corpus yields identical ids.

use tracing::trace;

use crate::models::Chunk;

/// Default window height in lines.
pub const DEFAULT_MAX_LINES: usize = 12;
/// Default overlap between consecutive windows.
pub const DEFAULT_OVERLAP_LINES: usize = 2;

/// Splits a document into overlapping line windows.
///
/// Window boundaries are aligned to source lines. Blank-only windows are
/// skipped. Invalid inputs (`max_lines == 0`, empty text) produce an empty
/// vector rather than an error.
pub fn chunk_document(
    document_id: &str,
    text: &str,
    max_lines: usize,
    overlap_lines: usize,
) -> Vec<Chunk> {
    if text.is_empty() || max_lines == 0 {
        trace!("chunk_document: empty text or zero max_lines; nothing to do");
        return Vec::new();
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let step = max_lines.saturating_sub(overlap_lines).max(1);

    let mut out = Vec::new();
    let mut start_line = 0usize;
    let mut order = 0u32;

    while start_line < lines.len() {
        let end_line = (start_line + max_lines).min(lines.len());
        let part: String = lines[start_line..end_line].iter().copied().collect();

        if !part.trim().is_empty() {
            out.push(Chunk {
                id: chunk_id(document_id, order, &part),
                token_count: approx_tokens(&part),
                text: part,
                source_document_id: document_id.to_string(),
            });
            order += 1;
        }

        if end_line == lines.len() {
            break;
        }
        start_line += step;
    }

    out
}

/// Convenience wrapper with the default window geometry.
pub fn chunk_document_default(document_id: &str, text: &str) -> Vec<Chunk> {
    chunk_document(document_id, text, DEFAULT_MAX_LINES, DEFAULT_OVERLAP_LINES)
}

/// Stable content-derived chunk id.
fn chunk_id(document_id: &str, order: u32, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(document_id.as_bytes());
    hasher.update(&order.to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize().to_hex();
    format!("{}:{}:{}", document_id, order, &digest.as_str()[..12])
}

/// Rough token estimate (4 chars ≈ 1 token).
fn approx_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}
