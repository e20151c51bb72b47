//! Data model shared by every pipeline stage.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Keywords scraped from a competitor listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorKeywords {
    #[serde(alias = "appname")]
    pub name: String,
    pub keywords: Vec<String>,
}

/// Canonical app listing produced by the normalizer. Read-only downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDocument {
    pub app_id: String,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub existing_keywords: Vec<String>,
    #[serde(default)]
    pub competitors: Vec<CompetitorKeywords>,
}

impl AppDocument {
    /// Text embedded for the document: title, subtitle and description.
    pub fn embedding_text(&self) -> String {
        [&self.title, &self.subtitle, &self.description]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Where a candidate phrase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Llm,
}

/// A proposed keyword phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub phrase: String,
    pub source: CandidateSource,
    pub llm_confidence: f64,
    pub intent_tags: BTreeSet<String>,
}

impl Candidate {
    pub fn from_llm(phrase: &str, confidence: f64, intent_tags: BTreeSet<String>) -> Self {
        Self {
            phrase: normalize_phrase(phrase),
            source: CandidateSource::Llm,
            llm_confidence: confidence.clamp(0.0, 1.0),
            intent_tags,
        }
    }
}

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
