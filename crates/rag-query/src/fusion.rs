//! Normalized weighted fusion of sparse and dense result lists.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rag_core::{DocId, MatchType, ScoredCandidate};

/// Sparse weight actually applied for a query.
///
/// When one path returned nothing, the other is weighted fully instead of
/// being diluted by a phantom zero.
pub fn effective_alpha(sparse_hits: usize, dense_hits: usize, alpha: f32) -> f32 {
    match (sparse_hits, dense_hits) {
        (0, d) if d > 0 => 0.0,
        (s, 0) if s > 0 => 1.0,
        _ => alpha,
    }
}

/// Fuse sparse and dense results into one ranking.
///
/// Each list is min-max normalized over the scores it actually returned
/// (a list whose scores are all equal normalizes to 1.0), then
/// `fused = alpha * sparse + (1 - alpha) * dense`, where a document missing
/// from a list contributes 0.0 for it.
///
/// Sorted by fused score descending; ties go to documents found by both
/// paths, then to the lower id. Both lists empty yields an empty ranking.
pub fn fuse(sparse: &[(DocId, f32)], dense: &[(DocId, f32)], alpha: f32) -> Vec<ScoredCandidate> {
    let alpha = effective_alpha(sparse.len(), dense.len(), alpha.clamp(0.0, 1.0));

    let sparse_norm = min_max(sparse);
    let dense_norm = min_max(dense);

    let mut ids: Vec<DocId> = sparse_norm.keys().chain(dense_norm.keys()).copied().collect();
    ids.sort();
    ids.dedup();

    let mut fused: Vec<ScoredCandidate> = ids
        .into_iter()
        .map(|id| {
            let s = sparse_norm.get(&id);
            let d = dense_norm.get(&id);
            let match_type = match (s, d) {
                (Some(_), Some(_)) => MatchType::Both,
                (Some(_), None) => MatchType::Sparse,
                _ => MatchType::Dense,
            };
            let (sparse_raw, sparse_n) = s.copied().unwrap_or((0.0, 0.0));
            let (dense_raw, dense_n) = d.copied().unwrap_or((0.0, 0.0));

            ScoredCandidate {
                doc_id: id,
                sparse_score: sparse_raw,
                dense_score: dense_raw,
                fused_score: alpha * sparse_n + (1.0 - alpha) * dense_n,
                match_type,
            }
        })
        .collect();

    fused.sort_by(rank_order);
    fused
}

/// Fused score desc, then paths found desc, then id asc.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| b.match_type.path_count().cmp(&a.match_type.path_count()))
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// id -> (raw, normalized). The first occurrence of a repeated id wins.
fn min_max(results: &[(DocId, f32)]) -> BTreeMap<DocId, (f32, f32)> {
    let mut scores: BTreeMap<DocId, f32> = BTreeMap::new();
    for &(id, score) in results {
        scores.entry(id).or_insert(score);
    }

    let min = scores.values().copied().fold(f32::INFINITY, f32::min);
    let max = scores.values().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    scores
        .into_iter()
        .map(|(id, raw)| {
            let normalized = if range > f32::EPSILON {
                ((raw - min) / range).clamp(0.0, 1.0)
            } else {
                1.0
            };
            (id, (raw, normalized))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(candidates: &[ScoredCandidate]) -> Vec<u64> {
        candidates.iter().map(|c| c.doc_id.0).collect()
    }

    #[test]
    fn test_both_empty() {
        assert!(fuse(&[], &[], 0.5).is_empty());
    }

    #[test]
    fn test_min_max_normalization() {
        let sparse = [(DocId(1), 0.9), (DocId(2), 0.5), (DocId(3), 0.1)];
        let dense = [(DocId(3), 0.8), (DocId(1), 0.2)];
        let fused = fuse(&sparse, &dense, 0.5);

        // 1: 0.5*1.0 + 0.5*0.0 = 0.5
        // 2: 0.5*0.5          = 0.25
        // 3: 0.5*0.0 + 0.5*1.0 = 0.5
        assert_eq!(ids(&fused), vec![1, 3, 2]);
        assert!((fused[0].fused_score - 0.5).abs() < 1e-6);
        assert!((fused[2].fused_score - 0.25).abs() < 1e-6);
        assert_eq!(fused[0].match_type, MatchType::Both);
        assert_eq!(fused[2].match_type, MatchType::Sparse);
        assert!((fused[0].sparse_score - 0.9).abs() < 1e-6);
        assert!((fused[0].dense_score - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_dense_missing_forces_sparse_only() {
        let sparse = [(DocId(4), 0.3), (DocId(2), 0.1)];
        let fused = fuse(&sparse, &[], 0.0);

        assert_eq!(ids(&fused), vec![4, 2]);
        assert!((fused[0].fused_score - 1.0).abs() < 1e-6);
        assert!(fused.iter().all(|c| c.match_type == MatchType::Sparse));
    }

    #[test]
    fn test_sparse_missing_forces_dense_only() {
        let dense = [(DocId(7), 0.9), (DocId(8), -0.2)];
        let fused = fuse(&[], &dense, 1.0);
        assert_eq!(ids(&fused), vec![7, 8]);
        assert!((fused[0].fused_score - 1.0).abs() < 1e-6);
        assert_eq!(fused[1].fused_score, 0.0);
    }

    #[test]
    fn test_single_result_normalizes_to_one() {
        let fused = fuse(&[(DocId(5), 0.01)], &[], 0.4);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].fused_score, 1.0);
    }

    #[test]
    fn test_tie_prefers_both_paths_then_lower_id() {
        // All-equal lists normalize to 1.0; alpha 0.5 gives 1.0 for doc 5
        // (both) and 0.5 for the others.
        let sparse = [(DocId(9), 0.4), (DocId(5), 0.4)];
        let dense = [(DocId(5), 0.7), (DocId(3), 0.7)];
        let fused = fuse(&sparse, &dense, 0.5);
        assert_eq!(ids(&fused), vec![5, 3, 9]);

        // Equal fused score, different path counts
        let sparse = [(DocId(1), 1.0), (DocId(2), 0.0)];
        let dense = [(DocId(2), 1.0), (DocId(3), 0.0)];
        let fused = fuse(&sparse, &dense, 0.5);
        // 1: 0.5 (sparse), 2: 0.0 + 0.5 = 0.5 (both), 3: 0.0 (dense)
        assert_eq!(ids(&fused), vec![2, 1, 3]);
    }

    #[test]
    fn test_effective_alpha() {
        assert_eq!(effective_alpha(3, 0, 0.2), 1.0);
        assert_eq!(effective_alpha(0, 3, 0.8), 0.0);
        assert_eq!(effective_alpha(3, 3, 0.4), 0.4);
        assert_eq!(effective_alpha(0, 0, 0.4), 0.4);
    }

    fn results() -> impl Strategy<Value = Vec<(DocId, f32)>> {
        prop::collection::vec((0u64..40, -1.0f32..1.0), 0..25)
            .prop_map(|v| v.into_iter().map(|(id, s)| (DocId(id), s)).collect())
    }

    proptest! {
        #[test]
        fn prop_sorted_and_deterministic(
            sparse in results(),
            dense in results(),
            alpha in 0.0f32..=1.0,
        ) {
            let a = fuse(&sparse, &dense, alpha);
            let b = fuse(&sparse, &dense, alpha);

            prop_assert_eq!(ids(&a), ids(&b));
            for pair in a.windows(2) {
                prop_assert!(pair[0].fused_score >= pair[1].fused_score);
                prop_assert_ne!(rank_order(&pair[0], &pair[1]), Ordering::Greater);
            }
        }

        #[test]
        fn prop_union_without_duplicates(sparse in results(), dense in results()) {
            let fused = fuse(&sparse, &dense, 0.5);
            let mut expected: Vec<u64> =
                sparse.iter().chain(dense.iter()).map(|(id, _)| id.0).collect();
            expected.sort();
            expected.dedup();

            let mut got = ids(&fused);
            got.sort();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn prop_scores_in_unit_range(
            sparse in results(),
            dense in results(),
            alpha in 0.0f32..=1.0,
        ) {
            for candidate in fuse(&sparse, &dense, alpha) {
                prop_assert!(candidate.fused_score >= 0.0);
                prop_assert!(candidate.fused_score <= 1.0 + 1e-6);
            }
        }

        #[test]
        fn prop_sparse_only_keeps_nonempty_ranking(sparse in results(), alpha in 0.0f32..=1.0) {
            let fused = fuse(&sparse, &[], alpha);
            prop_assert_eq!(fused.is_empty(), sparse.is_empty());
            if let Some(top) = fused.first() {
                prop_assert!((top.fused_score - 1.0).abs() < 1e-6);
            }
        }
    }
}
