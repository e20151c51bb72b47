//! Final ordering of cluster representatives.

use crate::types::{Cluster, ScoredCandidate};

/// One representative per cluster, by cluster score descending, then
/// shorter phrase, then lexicographic. At most `limit` entries.
pub fn rank(clusters: &[Cluster], scored: &[ScoredCandidate], limit: usize) -> Vec<ScoredCandidate> {
    let mut ordered: Vec<(&Cluster, &ScoredCandidate)> = clusters
        .iter()
        .filter_map(|c| scored.get(c.representative).map(|s| (c, s)))
        .collect();

    ordered.sort_by(|(ca, a), (cb, b)| {
        cb.score
            .total_cmp(&ca.score)
            .then_with(|| {
                a.candidate
                    .phrase
                    .chars()
                    .count()
                    .cmp(&b.candidate.phrase.chars().count())
            })
            .then_with(|| a.candidate.phrase.cmp(&b.candidate.phrase))
    });

    ordered
        .into_iter()
        .take(limit)
        .map(|(_, s)| s.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentScores;
    use keyplan_core::Candidate;
    use std::collections::BTreeSet;

    fn scored(phrase: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate::from_llm(phrase, score, BTreeSet::new()),
            merged_score: score,
            component_scores: ComponentScores::default(),
            cluster_id: None,
            document_affinity: None,
            cluster_members: Vec::new(),
        }
    }

    fn singleton(id: usize, score: f64) -> Cluster {
        Cluster {
            id,
            representative: id,
            members: vec![id],
            score,
        }
    }

    #[test]
    fn test_orders_by_score_then_length_then_text() {
        let items = vec![
            scored("puzzle", 0.4),
            scored("runner game", 0.7),
            scored("jump", 0.7),
            scored("dash", 0.7),
        ];
        let clusters: Vec<_> = items.iter().enumerate().map(|(i, s)| singleton(i, s.merged_score)).collect();
        let ranked = rank(&clusters, &items, 10);
        let phrases: Vec<_> = ranked.iter().map(|s| s.candidate.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["dash", "jump", "runner game", "puzzle"]);
    }

    #[test]
    fn test_limit_and_members_excluded() {
        let items = vec![scored("a", 0.9), scored("a b", 0.8), scored("c", 0.5)];
        let clusters = vec![
            Cluster {
                id: 0,
                representative: 0,
                members: vec![0, 1],
                score: 0.9,
            },
            Cluster {
                id: 1,
                representative: 2,
                members: vec![2],
                score: 0.5,
            },
        ];
        assert_eq!(rank(&clusters, &items, 10).len(), 2);
        let top = rank(&clusters, &items, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].candidate.phrase, "a");
    }

    #[test]
    fn test_empty() {
        assert!(rank(&[], &[], 5).is_empty());
    }
}
