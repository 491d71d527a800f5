//! Reciprocal Rank Fusion (RRF) for combining ranked lists.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use hybrid_core::{Contribution, DocKey, FusedResult, RankedList, ResultRecord, StrategyTag};

/// RRF constant (commonly 60).
/// Higher values give more weight to lower-ranked results.
pub const DEFAULT_RRF_K: u32 = 60;

/// Score a single appearance at 1-based `rank`.
pub fn rrf_contribution(k: u32, rank: u32) -> f64 {
    1.0 / (k as f64 + rank as f64)
}

struct Entry {
    record: ResultRecord,
    score: f64,
    sources: Vec<Contribution>,
}

/// Fuse ranked lists using Reciprocal Rank Fusion.
///
/// RRF score = Σ 1 / (k + rank_i) over the lists a chunk appears in, with
/// ranks counted per list from 1. Chunks are identified by
/// `(document_id, chunk_id)`; the record from the first appearance is kept.
///
/// The output holds every distinct chunk, sorted by descending score. Ties
/// keep first-appearance order. Nothing is truncated here.
pub fn reciprocal_rank_fusion(lists: &[RankedList], k: u32) -> Vec<FusedResult> {
    let mut slots: HashMap<DocKey, usize> = HashMap::new();
    let mut entries: Vec<Entry> = Vec::new();

    for list in lists {
        let mut seen: HashSet<DocKey> = HashSet::with_capacity(list.len());

        for (position, record) in list.iter().enumerate() {
            let key = record.key();
            // A chunk counts once per list, at its best rank.
            if !seen.insert(key.clone()) {
                continue;
            }

            let rank = position as u32 + 1;
            let contribution = Contribution {
                strategy: record.strategy,
                rank,
                raw_score: record.raw_score,
            };
            let score = rrf_contribution(k, rank);

            match slots.get(&key) {
                Some(&slot) => {
                    let entry = &mut entries[slot];
                    entry.score += score;
                    entry.sources.push(contribution);
                }
                None => {
                    slots.insert(key, entries.len());
                    entries.push(Entry {
                        record: record.clone(),
                        score,
                        sources: vec![contribution],
                    });
                }
            }
        }
    }

    // Stable sort keeps insertion order among equal scores.
    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| FusedResult {
            record: entry.record,
            score: entry.score,
            rank: i as u32 + 1,
            strategy: StrategyTag::HybridRrf,
            sources: entry.sources,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_core::{Strategy, UNKNOWN};

    const EPS: f64 = 1e-12;

    fn record(doc: &str, chunk: &str, strategy: Strategy) -> ResultRecord {
        ResultRecord {
            content: format!("{} {}", doc, chunk),
            document_id: doc.to_string(),
            chunk_id: chunk.to_string(),
            source_url: UNKNOWN.to_string(),
            last_modified: UNKNOWN.to_string(),
            raw_score: 1.0,
            strategy,
        }
    }

    fn list(docs: &[&str], strategy: Strategy) -> RankedList {
        docs.iter().map(|d| record(d, "0", strategy)).collect()
    }

    fn order(fused: &[FusedResult]) -> Vec<&str> {
        fused.iter().map(|r| r.record.document_id.as_str()).collect()
    }

    #[test]
    fn test_rrf_single_list_preserves_order() {
        let fused = reciprocal_rank_fusion(&[list(&["a", "b", "c"], Strategy::Lexical)], 60);

        assert_eq!(order(&fused), vec!["a", "b", "c"]);
        assert!((fused[0].score - 1.0 / 61.0).abs() < EPS);
        assert!((fused[2].score - 1.0 / 63.0).abs() < EPS);
        assert!(fused.iter().all(|r| r.strategy == StrategyTag::HybridRrf));
    }

    #[test]
    fn test_rrf_multiple_lists() {
        let lexical = list(&["a", "b", "c"], Strategy::Lexical);
        let dense = list(&["b", "a", "d"], Strategy::Dense);

        let fused = reciprocal_rank_fusion(&[lexical, dense], 60);

        // a and b tie (1/61 + 1/62); a appeared first.
        assert_eq!(order(&fused), vec!["a", "b", "c", "d"]);
        assert!((fused[0].score - fused[1].score).abs() < EPS);
        assert_eq!(fused.len(), 4);
        assert_eq!(
            fused.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_rrf_dedup_score() {
        let lexical = list(&["x", "y", "shared", "z"], Strategy::Lexical);
        let dense = list(&["p", "q", "r", "s", "shared"], Strategy::Dense);

        let fused = reciprocal_rank_fusion(&[lexical, dense], 60);
        let shared = fused
            .iter()
            .find(|r| r.record.document_id == "shared")
            .unwrap();

        assert!((shared.score - (1.0 / 63.0 + 1.0 / 65.0)).abs() < EPS);
        assert_eq!(shared.sources.len(), 2);
        assert_eq!(shared.sources[0].strategy, Strategy::Lexical);
        assert_eq!(shared.sources[0].rank, 3);
        assert_eq!(shared.sources[1].strategy, Strategy::Dense);
        assert_eq!(shared.sources[1].rank, 5);
        // The first appearance supplies the record.
        assert_eq!(shared.record.strategy, Strategy::Lexical);
        assert_eq!(fused.iter().filter(|r| r.record.document_id == "shared").count(), 1);
    }

    #[test]
    fn test_rrf_maximum_score() {
        let lists = vec![
            list(&["top", "a"], Strategy::Lexical),
            list(&["top", "b"], Strategy::Dense),
            list(&["top", "c"], Strategy::Sparse),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60);

        assert_eq!(fused[0].record.document_id, "top");
        assert!((fused[0].score - 3.0 / 61.0).abs() < EPS);
        assert!(fused[1..].iter().all(|r| r.score < fused[0].score));
    }

    #[test]
    fn test_rrf_scores_non_increasing() {
        let lists = vec![
            list(&["a", "b", "c", "d", "e"], Strategy::Lexical),
            list(&["e", "c", "f", "a"], Strategy::Dense),
            list(&["g", "c", "b"], Strategy::Sparse),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60);

        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(fused[0].record.document_id, "c");
    }

    #[test]
    fn test_rrf_deterministic_and_idempotent() {
        let lists = vec![
            list(&["a", "b", "c"], Strategy::Lexical),
            list(&["c", "d", "a"], Strategy::Dense),
        ];
        let first = reciprocal_rank_fusion(&lists, 60);
        let second = reciprocal_rank_fusion(&lists, 60);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rrf_chunk_identity() {
        // Same document, different chunks: distinct results.
        let lexical = vec![
            record("doc", "1", Strategy::Lexical),
            record("doc", "2", Strategy::Lexical),
        ];
        let dense = vec![record("doc", "2", Strategy::Dense)];

        let fused = reciprocal_rank_fusion(&[lexical, dense], 60);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].record.chunk_id, "2");
    }

    #[test]
    fn test_rrf_duplicate_within_list_counts_once() {
        let lexical = list(&["a", "a", "b"], Strategy::Lexical);
        let fused = reciprocal_rank_fusion(&[lexical], 60);

        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - 1.0 / 61.0).abs() < EPS);
        assert!((fused[1].score - 1.0 / 63.0).abs() < EPS);
    }

    #[test]
    fn test_rrf_empty_inputs() {
        assert!(reciprocal_rank_fusion(&[], 60).is_empty());
        assert!(reciprocal_rank_fusion(&[Vec::new(), Vec::new()], 60).is_empty());
    }

    #[test]
    fn test_rrf_one_non_empty_list_among_empty() {
        let lists = vec![Vec::new(), list(&["a", "b"], Strategy::Dense), Vec::new()];
        let fused = reciprocal_rank_fusion(&lists, 60);
        assert_eq!(order(&fused), vec!["a", "b"]);
        assert!((fused[1].score - 1.0 / 62.0).abs() < EPS);
    }

    #[test]
    fn test_rrf_custom_k() {
        let fused = reciprocal_rank_fusion(&[list(&["a"], Strategy::Lexical)], 0);
        assert!((fused[0].score - 1.0).abs() < EPS);
        assert!((rrf_contribution(DEFAULT_RRF_K, 1) - 1.0 / 61.0).abs() < EPS);
    }
}
