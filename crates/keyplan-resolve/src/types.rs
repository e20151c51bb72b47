//! Retrieval types.

use serde::{Deserialize, Serialize};

/// A raw hit returned by a vector index, before filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub record_id: String,
    /// Similarity reported by the index; may fall outside [0, 1].
    pub similarity: f64,
    #[serde(default)]
    pub frequency: Option<u64>,
}

/// A retained match between a candidate and an indexed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalMatch {
    pub candidate_id: usize,
    pub matched_record_id: String,
    /// Always within [0, 1].
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_record_frequency: Option<u64>,
}
