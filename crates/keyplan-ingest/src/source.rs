//! Listing sources: where raw App Store metadata comes from.

use std::time::Duration;

use async_trait::async_trait;
use keyplan_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::listing::{prepare_store_url, resolve_app_id};
use crate::types::RawListing;

pub const ITUNES_LOOKUP_URL: &str = "https://itunes.apple.com/lookup";

/// A source of raw listing data for an app identifier (store URL or id).
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, app_identifier: &str, country: &str) -> Result<RawListing>;
}

/// Fetches listings from the public iTunes lookup API.
pub struct ItunesListingSource {
    client: Client,
    lookup_url: String,
}

impl ItunesListingSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_lookup_url(ITUNES_LOOKUP_URL, timeout)
    }

    pub fn with_lookup_url(lookup_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            lookup_url: lookup_url.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult {
    track_id: Option<u64>,
    track_name: Option<String>,
    track_view_url: Option<String>,
    description: Option<String>,
    primary_genre_name: Option<String>,
    #[serde(default)]
    genres: Vec<String>,
}

impl From<LookupResult> for RawListing {
    fn from(r: LookupResult) -> Self {
        RawListing {
            app_id: r.track_id.map(|id| id.to_string()),
            app_url: r.track_view_url,
            title: r.track_name,
            subtitle: None,
            description: r.description,
            category: r.primary_genre_name.or_else(|| r.genres.into_iter().next()),
            meta_keywords: None,
            keywords: Vec::new(),
            competitors: Vec::new(),
        }
    }
}

#[async_trait]
impl ListingSource for ItunesListingSource {
    async fn fetch(&self, app_identifier: &str, country: &str) -> Result<RawListing> {
        let app_id = resolve_app_id(app_identifier)?;
        debug!("Looking up app {} in storefront {}", app_id, country);

        let response = self
            .client
            .get(&self.lookup_url)
            .query(&[("id", app_id.as_str()), ("country", country)])
            .send()
            .await
            .map_err(|e| Error::DataSourceUnavailable(format!("lookup request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::DataSourceUnavailable(format!(
                "lookup returned {}: {}",
                status, body
            )));
        }

        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedInput(format!("unexpected lookup payload: {}", e)))?;

        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedInput(format!("no listing found for app {}", app_id)))?;

        let mut raw = RawListing::from(result);
        raw.app_url = raw.app_url.map(|url| prepare_store_url(&url, country));
        if raw.app_id.is_none() {
            raw.app_id = Some(app_id);
        }
        Ok(raw)
    }
}

/// Serves a fixed listing; used for already-scraped payloads and tests.
pub struct StaticListingSource {
    listing: RawListing,
}

impl StaticListingSource {
    pub fn new(listing: RawListing) -> Self {
        Self { listing }
    }
}

#[async_trait]
impl ListingSource for StaticListingSource {
    async fn fetch(&self, _app_identifier: &str, _country: &str) -> Result<RawListing> {
        Ok(self.listing.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_result_mapping() {
        let json = r#"{
            "resultCount": 1,
            "results": [{
                "trackId": 123,
                "trackName": "Pixel Runner",
                "trackViewUrl": "https://apps.apple.com/us/app/pixel-runner/id123",
                "description": "endless runner arcade game",
                "genres": ["Games", "Arcade"]
            }]
        }"#;
        let parsed: LookupResponse = serde_json::from_str(json).unwrap();
        let raw = RawListing::from(parsed.results.into_iter().next().unwrap());
        assert_eq!(raw.app_id.as_deref(), Some("123"));
        assert_eq!(raw.title.as_deref(), Some("Pixel Runner"));
        assert_eq!(raw.category.as_deref(), Some("Games"));
    }

    #[tokio::test]
    async fn test_invalid_identifier_is_malformed() {
        let source = ItunesListingSource::new(Duration::from_secs(1)).unwrap();
        let err = source.fetch("https://example.com/no-id-here", "us").await.unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticListingSource::new(RawListing {
            title: Some("Pixel Runner".into()),
            ..Default::default()
        });
        let raw = source.fetch("anything", "us").await.unwrap();
        assert_eq!(raw.title.as_deref(), Some("Pixel Runner"));
    }
}
