//! Similarity retriever: candidate vector → filtered nearest records.

use std::sync::Arc;

use keyplan_core::{Error, Result};
use ndarray::Array1;
use tracing::debug;

use crate::index::VectorIndex;
use crate::types::RetrievalMatch;

pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.3;

/// Queries the index and keeps matches at or above the similarity floor.
pub struct SimilarityRetriever {
    index: Arc<dyn VectorIndex>,
    floor: f64,
}

impl SimilarityRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, floor: f64) -> Self {
        Self {
            index,
            floor: floor.clamp(0.0, 1.0),
        }
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Retrieve at most `top_k` matches for one candidate.
    ///
    /// Matches come back in non-increasing similarity order; equal
    /// similarities keep the index's native order. Similarities are clamped
    /// into [0, 1] before the floor is applied. Any index failure becomes
    /// `Retrieval`.
    pub async fn retrieve(
        &self,
        candidate_id: usize,
        vector: &Array1<f32>,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.index.query(vector, top_k).await.map_err(|e| match e {
            Error::Retrieval(msg) => Error::Retrieval(msg),
            other => Error::Retrieval(format!("{} query failed: {}", self.index.name(), other)),
        })?;

        let total = hits.len();
        let mut matches: Vec<RetrievalMatch> = hits
            .into_iter()
            .filter(|h| h.similarity.is_finite())
            .map(|h| RetrievalMatch {
                candidate_id,
                matched_record_id: h.record_id,
                similarity: h.similarity.clamp(0.0, 1.0),
                matched_record_frequency: h.frequency,
            })
            .filter(|m| m.similarity >= self.floor)
            .collect();
        // Stable sort: ties stay in index order.
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(top_k);

        debug!(
            "Candidate {}: {} of {} hits above floor {}",
            candidate_id,
            matches.len(),
            total,
            self.floor
        );
        Ok(matches)
    }
}
