//! OpenAI-compatible embedding client.

use std::time::Duration;

use async_trait::async_trait;
use keyplan_core::{Error, Result};
use ndarray::Array1;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedder::EmbedderBackend;

pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding service settings, read from the environment.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Requested output dimension, if the model supports shortening.
    pub dimensions: Option<usize>,
    pub timeout: Duration,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_EMBEDDING_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl EmbedderConfig {
    /// `KEYPLAN_EMBEDDING_API_KEY` (falls back to `OPENAI_API_KEY`),
    /// `KEYPLAN_EMBEDDING_BASE_URL`, `KEYPLAN_EMBEDDING_MODEL`, `KEYPLAN_EMBEDDING_DIM`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("KEYPLAN_EMBEDDING_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("KEYPLAN_EMBEDDING_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("KEYPLAN_EMBEDDING_MODEL").unwrap_or(defaults.model),
            dimensions: std::env::var("KEYPLAN_EMBEDDING_DIM")
                .ok()
                .and_then(|d| d.parse().ok()),
            timeout: defaults.timeout,
        }
    }
}

/// Async embeddings client for OpenAI-compatible endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("missing embedding API key".into()))?;
        if config.model.trim().is_empty() {
            return Err(Error::Config("missing embedding model name".into()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| Error::Config("invalid embedding API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbedderBackend for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
            dimensions: self.dimensions,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Embedding(format!("API error {}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse response: {}", e)))?;
        let data = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("response contained no embeddings".into()))?;
        Ok(Array1::from(data.embedding))
    }

    fn dimension(&self) -> usize {
        self.dimensions.unwrap_or(0)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
