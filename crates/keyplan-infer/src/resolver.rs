//! Embedding resolver: text → validated, memoized vector.

use std::sync::Arc;

use keyplan_core::{Error, Result};
use ndarray::Array1;
use serde::Serialize;
use tracing::debug;

use crate::cache::EmbeddingCache;
use crate::embedder::EmbedderBackend;

/// What an embedding belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "id")]
pub enum EmbeddingOwner {
    /// Index of the candidate within the run.
    Candidate(usize),
    /// App id of the document.
    Document(String),
}

/// An embedding tied to its owner.
#[derive(Debug, Clone)]
pub struct EmbeddingVector {
    pub owner: EmbeddingOwner,
    pub values: Array1<f32>,
    /// Whether this was served from the run cache.
    pub cached: bool,
}

/// Resolves text to embeddings through a backend and a per-run cache.
pub struct EmbeddingResolver {
    backend: Arc<dyn EmbedderBackend>,
    cache: EmbeddingCache,
}

impl EmbeddingResolver {
    pub fn new(backend: Arc<dyn EmbedderBackend>) -> Self {
        Self {
            backend,
            cache: EmbeddingCache::for_run(),
        }
    }

    /// Embed `text` for `owner`. Identical text yields identical values.
    pub async fn embed(&self, owner: EmbeddingOwner, text: &str) -> Result<EmbeddingVector> {
        if text.trim().is_empty() {
            return Err(Error::Embedding(format!("empty text for {:?}", owner)));
        }

        if let Some(values) = self.cache.get(text) {
            return Ok(EmbeddingVector {
                owner,
                values,
                cached: true,
            });
        }

        let values = self.backend.embed(text).await?;
        self.check(&values, text)?;
        let values = self.cache.insert_if_absent(text, values);
        debug!("Embedded {:?} via {} (dim={})", owner, self.backend.name(), values.len());

        Ok(EmbeddingVector {
            owner,
            values,
            cached: false,
        })
    }

    fn check(&self, values: &Array1<f32>, text: &str) -> Result<()> {
        if values.is_empty() {
            return Err(Error::Embedding(format!("empty vector for {:?}", text)));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Embedding(format!("non-finite values for {:?}", text)));
        }
        let expected = self.backend.dimension();
        if expected > 0 && values.len() != expected {
            return Err(Error::Embedding(format!(
                "dimension mismatch for {:?}: expected {}, got {}",
                text,
                expected,
                values.len()
            )));
        }
        Ok(())
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot = f64::from(a.dot(b));
    let norm_a = f64::from(a.dot(a)).sqrt();
    let norm_b = f64::from(b.dot(b)).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
