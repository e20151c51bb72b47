//! Deterministic lexical embedder.
//!
//! Feature hashing over word tokens and character trigrams, L2-normalized.
//! Not a neural model, but stable across processes and good enough to pull
//! near-identical phrases together when no embedding service is configured.

use async_trait::async_trait;
use keyplan_core::Result;
use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::embedder::EmbedderBackend;

pub const DEFAULT_LEXICAL_DIM: usize = 256;

pub struct LexicalEmbedder {
    dim: usize,
}

impl LexicalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Embed synchronously; the async trait method delegates here.
    pub fn embed_text(&self, text: &str) -> Array1<f32> {
        let mut vec = Array1::<f32>::zeros(self.dim);
        let lower = text.to_lowercase();

        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            self.add_feature(&mut vec, token.as_bytes(), 1.0);

            let padded: Vec<char> = format!("#{}#", token).chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.add_feature(&mut vec, gram.as_bytes(), 0.5);
            }
        }

        let norm = vec.dot(&vec).sqrt();
        if norm > 0.0 {
            vec.mapv_inplace(|x| x / norm);
        }
        vec
    }

    fn add_feature(&self, vec: &mut Array1<f32>, feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(bucket) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign * weight;
    }
}

impl Default for LexicalEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_LEXICAL_DIM)
    }
}

#[async_trait]
impl EmbedderBackend for LexicalEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::cosine_similarity;

    #[test]
    fn test_deterministic() {
        let e = LexicalEmbedder::default();
        assert_eq!(e.embed_text("endless runner"), e.embed_text("endless runner"));
    }

    #[test]
    fn test_unit_norm() {
        let v = LexicalEmbedder::default().embed_text("pixel game");
        assert!((v.dot(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_insensitive() {
        let e = LexicalEmbedder::default();
        assert_eq!(e.embed_text("Pixel Game"), e.embed_text("pixel game"));
    }

    #[test]
    fn test_related_phrases_closer_than_unrelated() {
        let e = LexicalEmbedder::default();
        let a = e.embed_text("endless runner");
        let b = e.embed_text("endless runners");
        let c = e.embed_text("budget tracker");
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = LexicalEmbedder::new(16).embed_text("  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
