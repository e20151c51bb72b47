//! Greedy near-duplicate clustering.
//!
//! Candidates are visited best-first. Each one joins the first existing
//! cluster whose representative is strictly more similar than the threshold,
//! or seeds a new cluster. Clusters are never merged or reordered afterwards,
//! so the highest-scoring phrase of a group is always its representative.

use std::cmp::Ordering;

use keyplan_infer::cosine_similarity;
use ndarray::Array1;
use tracing::{debug, info};

use crate::types::{Cluster, ScoredCandidate};

/// Visit order: merged score descending, then shorter phrase, then
/// lexicographic, then input position.
pub fn processing_order(scored: &[ScoredCandidate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scored.len()).collect();
    order.sort_by(|&a, &b| {
        let (x, y) = (&scored[a], &scored[b]);
        y.merged_score
            .total_cmp(&x.merged_score)
            .then_with(|| phrase_len(x).cmp(&phrase_len(y)))
            .then_with(|| x.candidate.phrase.cmp(&y.candidate.phrase))
            .then_with(|| a.cmp(&b))
    });
    order
}

fn phrase_len(s: &ScoredCandidate) -> usize {
    s.candidate.phrase.chars().count()
}

/// Cluster `scored` in place. `embeddings[i]` belongs to `scored[i]`.
///
/// Sets `cluster_id` on every candidate and fills `cluster_members` on each
/// representative.
pub fn deduplicate(scored: &mut [ScoredCandidate], embeddings: &[Array1<f32>], threshold: f64) -> Vec<Cluster> {
    debug_assert_eq!(scored.len(), embeddings.len());
    let mut clusters: Vec<Cluster> = Vec::new();

    for idx in processing_order(scored) {
        let joined = clusters.iter_mut().find(|c| {
            let sim = cosine_similarity(&embeddings[c.representative], &embeddings[idx]);
            sim.partial_cmp(&threshold) == Some(Ordering::Greater)
        });

        match joined {
            Some(cluster) => {
                debug!(
                    "{:?} joins cluster {} ({:?})",
                    scored[idx].candidate.phrase, cluster.id, scored[cluster.representative].candidate.phrase
                );
                cluster.members.push(idx);
                scored[idx].cluster_id = Some(cluster.id);
            }
            None => {
                let id = clusters.len();
                scored[idx].cluster_id = Some(id);
                clusters.push(Cluster {
                    id,
                    representative: idx,
                    members: vec![idx],
                    score: scored[idx].merged_score,
                });
            }
        }
    }

    for cluster in &clusters {
        let absorbed: Vec<String> = cluster.members[1..]
            .iter()
            .map(|&m| scored[m].candidate.phrase.clone())
            .collect();
        scored[cluster.representative].cluster_members = absorbed;
    }

    info!(
        "Deduplicated {} candidates into {} clusters (threshold {})",
        scored.len(),
        clusters.len(),
        threshold
    );
    clusters
}
