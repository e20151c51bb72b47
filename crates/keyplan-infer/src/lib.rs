//! Keyplan Infer: embedding backends, per-run cache, embedding resolver.
//!
//! Provides the `EmbedderBackend` trait for generating embeddings.
//! When an embedding API key is configured, `OpenAiEmbedder` is used.
//! Without one, `LexicalEmbedder` keeps the pipeline working offline.

pub mod cache;
pub mod embedder;
pub mod lexical;
pub mod openai;
pub mod resolver;

pub use cache::EmbeddingCache;
pub use embedder::EmbedderBackend;
pub use lexical::LexicalEmbedder;
pub use openai::{EmbedderConfig, OpenAiEmbedder};
pub use resolver::{cosine_similarity, EmbeddingOwner, EmbeddingResolver, EmbeddingVector};

use std::sync::Arc;

/// Create the best available embedder for the given configuration.
///
/// Tries the OpenAI-compatible service first, falls back to `LexicalEmbedder`.
pub fn create_embedder(config: &EmbedderConfig) -> Arc<dyn EmbedderBackend> {
    if config.api_key.is_some() {
        match OpenAiEmbedder::new(config) {
            Ok(embedder) => {
                tracing::info!("Using OpenAI-compatible embedder (model={})", config.model);
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!("Embedding service unavailable: {}. Falling back to lexical.", e);
            }
        }
    } else {
        tracing::info!("No embedding API key set. Using lexical embedder.");
    }

    Arc::new(LexicalEmbedder::default())
}
