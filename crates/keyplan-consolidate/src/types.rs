//! Consolidation types.

use keyplan_core::Candidate;
use keyplan_resolve::RetrievalMatch;
use serde::Serialize;

/// Everything gathered for one candidate before merging.
#[derive(Debug, Clone)]
pub struct CandidateSignals {
    pub candidate: Candidate,
    /// Matches in index order; empty when retrieval failed or found nothing.
    pub matches: Vec<RetrievalMatch>,
    /// Cosine between the phrase and the app document, if both were embedded.
    pub document_affinity: Option<f64>,
}

/// Per-signal scores, each within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ComponentScores {
    pub llm: f64,
    pub similarity: f64,
    pub frequency: f64,
}

/// A candidate with its fused score and cluster assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub merged_score: f64,
    pub component_scores: ComponentScores,
    /// Set by deduplication.
    pub cluster_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_affinity: Option<f64>,
    /// Phrases absorbed into this candidate's cluster (representatives only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cluster_members: Vec<String>,
}

/// A group of near-duplicate candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: usize,
    /// Index (into the scored slice) of the seeding member.
    pub representative: usize,
    /// Indices of all members, representative first.
    pub members: Vec<usize>,
    /// Merged score of the representative.
    pub score: f64,
}
