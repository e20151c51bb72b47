//! Signal merger: LLM confidence, retrieval similarity and record frequency
//! fused into one weighted score per candidate.

use keyplan_core::ScoreWeights;
use tracing::debug;

use crate::types::{CandidateSignals, ComponentScores, ScoredCandidate};

/// Min-max normalize each candidate's top-match frequency across the set.
///
/// Matches arrive ordered by similarity, so the first one is the top match.
/// Absent frequencies score 0. When every observed value is equal, positive
/// values score 1 and zeros score 0.
pub fn frequency_scores(signals: &[CandidateSignals]) -> Vec<f64> {
    let raw: Vec<Option<u64>> = signals
        .iter()
        .map(|s| s.matches.first().and_then(|m| m.matched_record_frequency))
        .collect();

    let observed = raw.iter().flatten().copied();
    let (min, max) = match observed.clone().min().zip(observed.max()) {
        Some(bounds) => bounds,
        None => return vec![0.0; signals.len()],
    };

    raw.iter()
        .map(|f| match f {
            None => 0.0,
            Some(v) if max > min => (*v - min) as f64 / (max - min) as f64,
            Some(v) => {
                if *v > 0 {
                    1.0
                } else {
                    0.0
                }
            }
        })
        .collect()
}

/// Fuse signals into scored candidates, preserving input order.
///
/// Weights are expected to be validated already; they are applied as given.
pub fn merge_signals(signals: Vec<CandidateSignals>, weights: &ScoreWeights) -> Vec<ScoredCandidate> {
    let frequencies = frequency_scores(&signals);

    signals
        .into_iter()
        .zip(frequencies)
        .map(|(signal, frequency)| {
            let similarity = signal
                .matches
                .iter()
                .map(|m| m.similarity)
                .fold(0.0_f64, f64::max);
            let components = ComponentScores {
                llm: signal.candidate.llm_confidence,
                similarity,
                frequency,
            };
            let merged_score = weights.llm * components.llm
                + weights.similarity * components.similarity
                + weights.frequency * components.frequency;
            debug!(
                "{:?}: llm={:.3} sim={:.3} freq={:.3} -> {:.4}",
                signal.candidate.phrase, components.llm, components.similarity, components.frequency, merged_score
            );

            ScoredCandidate {
                candidate: signal.candidate,
                merged_score,
                component_scores: components,
                cluster_id: None,
                document_affinity: signal.document_affinity,
                cluster_members: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyplan_core::Candidate;
    use keyplan_resolve::RetrievalMatch;
    use std::collections::BTreeSet;

    fn signal(phrase: &str, conf: f64, matches: &[(f64, Option<u64>)]) -> CandidateSignals {
        CandidateSignals {
            candidate: Candidate::from_llm(phrase, conf, BTreeSet::new()),
            matches: matches
                .iter()
                .enumerate()
                .map(|(i, (sim, freq))| RetrievalMatch {
                    candidate_id: 0,
                    matched_record_id: format!("r{}", i),
                    similarity: *sim,
                    matched_record_frequency: *freq,
                })
                .collect(),
            document_affinity: None,
        }
    }

    #[test]
    fn test_min_max_frequency() {
        let signals = vec![
            signal("a", 0.5, &[(0.8, Some(10))]),
            signal("b", 0.5, &[(0.8, Some(30))]),
            signal("c", 0.5, &[(0.8, Some(20))]),
            signal("d", 0.5, &[]),
            signal("e", 0.5, &[(0.8, None), (0.7, Some(99))]),
        ];
        assert_eq!(frequency_scores(&signals), vec![0.0, 1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_equal_frequencies() {
        let positive = vec![signal("a", 0.5, &[(0.8, Some(7))]), signal("b", 0.5, &[(0.8, Some(7))])];
        assert_eq!(frequency_scores(&positive), vec![1.0, 1.0]);

        let zero = vec![signal("a", 0.5, &[(0.8, Some(0))]), signal("b", 0.5, &[])];
        assert_eq!(frequency_scores(&zero), vec![0.0, 0.0]);
    }

    #[test]
    fn test_weighted_sum() {
        let signals = vec![
            signal("endless runner", 0.9, &[(0.8, Some(10)), (0.6, Some(50))]),
            signal("pixel game", 0.7, &[(0.4, Some(20))]),
        ];
        let scored = merge_signals(signals, &ScoreWeights::default());

        let first = &scored[0];
        assert_eq!(first.component_scores.similarity, 0.8);
        assert_eq!(first.component_scores.frequency, 0.0);
        assert!((first.merged_score - (0.5 * 0.9 + 0.3 * 0.8)).abs() < 1e-12);

        let second = &scored[1];
        assert_eq!(second.component_scores.frequency, 1.0);
        assert!((second.merged_score - (0.5 * 0.7 + 0.3 * 0.4 + 0.2)).abs() < 1e-12);
        assert!(scored.iter().all(|s| s.cluster_id.is_none()));
    }

    #[test]
    fn test_no_matches_scores_llm_only() {
        let scored = merge_signals(vec![signal("arcade runner", 0.85, &[])], &ScoreWeights::default());
        assert!((scored[0].merged_score - 0.425).abs() < 1e-12);
        assert_eq!(scored[0].component_scores.similarity, 0.0);
    }
}
