//! Typesense vector search backend.

use std::time::Duration;

use async_trait::async_trait;
use keyplan_core::{Error, Result};
use ndarray::Array1;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::index::VectorIndex;
use crate::types::IndexHit;

pub const DEFAULT_COLLECTION: &str = "aiKeywords";
pub const DEFAULT_VECTOR_FIELD: &str = "embedding";
pub const DEFAULT_FREQUENCY_FIELD: &str = "frequency";

/// Typesense connection settings.
#[derive(Debug, Clone)]
pub struct TypesenseConfig {
    /// Base URL, e.g. `https://xyz.a1.typesense.net`. A bare host gets `https://`.
    pub host: String,
    pub api_key: String,
    pub collection: String,
    pub vector_field: String,
    pub frequency_field: String,
    pub timeout: Duration,
}

impl TypesenseConfig {
    /// `TYPESENSE_HOST`, `TYPESENSE_API_KEY`, `TYPESENSE_COLLECTION`,
    /// `TYPESENSE_VECTOR_FIELD`. `None` when no host is set.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("TYPESENSE_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())?;
        Some(Self {
            host,
            api_key: std::env::var("TYPESENSE_API_KEY").unwrap_or_default(),
            collection: std::env::var("TYPESENSE_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_COLLECTION.into()),
            vector_field: std::env::var("TYPESENSE_VECTOR_FIELD")
                .unwrap_or_else(|_| DEFAULT_VECTOR_FIELD.into()),
            frequency_field: DEFAULT_FREQUENCY_FIELD.into(),
            timeout: Duration::from_secs(5),
        })
    }

    fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}

/// Vector index backed by a Typesense collection.
pub struct TypesenseIndex {
    client: Client,
    endpoint: String,
    api_key: String,
    collection: String,
    vector_field: String,
    frequency_field: String,
}

impl TypesenseIndex {
    pub fn new(config: &TypesenseConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("TYPESENSE_API_KEY is not set".into()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/multi_search", config.base_url()),
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            vector_field: config.vector_field.clone(),
            frequency_field: config.frequency_field.clone(),
        })
    }

    fn request_body(&self, vector: &Array1<f32>, top_k: usize) -> Value {
        let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        json!({
            "searches": [{
                "collection": self.collection,
                "q": "*",
                "vector_query": format!("{}:([{}], k:{})", self.vector_field, values.join(","), top_k),
                "exclude_fields": self.vector_field,
                "per_page": top_k,
            }]
        })
    }

    fn parse_hits(&self, body: &Value) -> Result<Vec<IndexHit>> {
        let result = &body["results"][0];
        if let Some(message) = result["error"].as_str() {
            return Err(Error::Retrieval(format!("typesense: {}", message)));
        }
        let hits = result["hits"]
            .as_array()
            .ok_or_else(|| Error::Retrieval("typesense response has no hits array".into()))?;

        Ok(hits
            .iter()
            .filter_map(|hit| {
                let distance = hit["vector_distance"].as_f64()?;
                let doc = &hit["document"];
                let record_id = doc["id"].as_str()?.to_string();
                Some(IndexHit {
                    record_id,
                    similarity: 1.0 - distance,
                    frequency: doc[self.frequency_field.as_str()].as_u64(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for TypesenseIndex {
    async fn query(&self, vector: &Array1<f32>, top_k: usize) -> Result<Vec<IndexHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-TYPESENSE-API-KEY", &self.api_key)
            .json(&self.request_body(vector, top_k))
            .send()
            .await
            .map_err(|e| Error::Retrieval(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Retrieval(format!("typesense error {}: {}", status, body)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Retrieval(format!("invalid response body: {}", e)))?;
        let hits = self.parse_hits(&body)?;
        debug!("Typesense returned {} hits from {}", hits.len(), self.collection);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "typesense"
    }
}
