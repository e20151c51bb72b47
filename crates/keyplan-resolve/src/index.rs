//! Vector index abstraction.

use async_trait::async_trait;
use keyplan_core::Result;
use ndarray::Array1;

use crate::types::IndexHit;

/// Nearest-neighbour lookup over indexed keyword records.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `top_k` hits, most similar first.
    async fn query(&self, vector: &Array1<f32>, top_k: usize) -> Result<Vec<IndexHit>>;

    /// Index identifier for logs.
    fn name(&self) -> &str;
}

/// Index with no records. Every query returns no hits.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyIndex;

#[async_trait]
impl VectorIndex for EmptyIndex {
    async fn query(&self, _vector: &Array1<f32>, _top_k: usize) -> Result<Vec<IndexHit>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "empty"
    }
}
