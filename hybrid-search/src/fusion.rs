//! Reciprocal-rank fusion of independently ranked lists.
//!
//! RRF needs no tuning and is insensitive to the absolute score scale of
//! either path — only ranks matter:
//!
//! ```text
//! fused_score(c) = Σ over lists containing c of 1 / (k + rank(c))
//! ```
//!
//! `k` (default 60) smooths the curve so rank-1 items cannot dominate.
//! A chunk absent from a list contributes nothing for that list; a chunk
//! present in several lists fuses **once**. Ordering is a total order:
//! fused score descending, then best (smallest) contributing rank, then
//! chunk id — repeated calls over the same input are byte-identical.
//!
//! Reference: Cormack, Clarke & Buettcher, "Reciprocal rank fusion
//! outperforms Condorcet and individual rank learning methods", SIGIR'09.

use std::collections::HashMap;

use crate::models::{FusedEntry, RankedEntry};

/// Industry-standard smoothing constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Fuses any number of ranked lists into the top `top_n` entries.
pub fn fuse(lists: &[&[RankedEntry]], k: u32, top_n: usize) -> Vec<FusedEntry> {
    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();

    for list in lists {
        for entry in *list {
            let contribution = 1.0 / (k as f64 + entry.rank as f64);
            let slot = acc
                .entry(entry.chunk_id.as_str())
                .or_insert((0.0, usize::MAX));
            slot.0 += contribution;
            slot.1 = slot.1.min(entry.rank);
        }
    }

    let mut fused: Vec<FusedEntry> = acc
        .into_iter()
        .map(|(chunk_id, (fused_score, best_rank))| FusedEntry {
            chunk_id: chunk_id.to_string(),
            fused_score,
            best_rank,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank.cmp(&b.best_rank))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused.truncate(top_n);
    fused
}

/// Convenience wrapper for the common two-path case.
pub fn fuse_two(
    a: &[RankedEntry],
    b: &[RankedEntry],
    k: u32,
    top_n: usize,
) -> Vec<FusedEntry> {
    fuse(&[a, b], k, top_n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunk_id: &str, rank: usize) -> RankedEntry {
        RankedEntry {
            chunk_id: chunk_id.to_string(),
            rank,
            score: 1.0 / rank as f64,
        }
    }

    #[test]
    fn worked_example_rank_then_id_tie_break() {
        // keyword [B:1, A:2], semantic [A:1, C:2], k = 60:
        //   A = 1/61 + 1/62 ≈ 0.0325
        //   B = 1/61 ≈ 0.0164, C = 1/62 ≈ 0.0161
        let keyword = vec![entry("B", 1), entry("A", 2)];
        let semantic = vec![entry("A", 1), entry("C", 2)];

        let fused = fuse_two(&keyword, &semantic, 60, 10);
        let order: Vec<&str> = fused.iter().map(|f| f.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert!(fused[0].fused_score > fused[1].fused_score);
        // B beats C on the best-rank tie-break (1 vs 2).
        assert!(fused[1].best_rank < fused[2].best_rank);
    }

    #[test]
    fn doubly_ranked_first_beats_singly_ranked_first() {
        let a = vec![entry("X", 1), entry("Y", 2)];
        let b = vec![entry("X", 1), entry("Z", 2)];
        let fused = fuse_two(&a, &b, 60, 10);
        assert_eq!(fused[0].chunk_id, "X");
        assert!(fused[0].fused_score > fused[1].fused_score);
    }

    #[test]
    fn duplicates_fuse_once() {
        let a = vec![entry("X", 1)];
        let b = vec![entry("X", 3)];
        let fused = fuse_two(&a, &b, 60, 10);
        assert_eq!(fused.len(), 1);
        let expected = 1.0 / 61.0 + 1.0 / 63.0;
        assert!((fused[0].fused_score - expected).abs() < 1e-12);
        assert_eq!(fused[0].best_rank, 1);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let a = vec![entry("q", 1), entry("p", 2), entry("r", 3)];
        let b = vec![entry("r", 1), entry("q", 2), entry("s", 3)];
        let first = fuse_two(&a, &b, 60, 10);
        for _ in 0..5 {
            assert_eq!(fuse_two(&a, &b, 60, 10), first);
        }
    }

    #[test]
    fn equal_score_equal_rank_falls_back_to_id() {
        // Same rank in disjoint lists: identical score and best_rank.
        let a = vec![entry("beta", 1)];
        let b = vec![entry("alpha", 1)];
        let fused = fuse_two(&a, &b, 60, 10);
        let order: Vec<&str> = fused.iter().map(|f| f.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["alpha", "beta"]);
    }

    #[test]
    fn one_empty_list_degrades_to_the_other() {
        let a: Vec<RankedEntry> = Vec::new();
        let b = vec![entry("only", 1)];
        let fused = fuse_two(&a, &b, 60, 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].chunk_id, "only");
    }

    #[test]
    fn top_n_truncates_after_ordering() {
        let a = vec![entry("a", 1), entry("b", 2), entry("c", 3)];
        let b = vec![entry("b", 1)];
        let fused = fuse_two(&a, &b, 60, 2);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].chunk_id, "b");
    }
}
