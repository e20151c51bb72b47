//! Embedding backend trait.
//!
//! Implementations:
//! - `OpenAiEmbedder`: OpenAI-compatible `/embeddings` endpoint
//! - `LexicalEmbedder`: offline feature hashing, used when no API key is set

use async_trait::async_trait;
use keyplan_core::Result;
use ndarray::Array1;

/// Trait for embedding backends.
#[async_trait]
pub trait EmbedderBackend: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Get the embedding dimension, or 0 if the backend does not know it up front.
    fn dimension(&self) -> usize;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}
