//! Metadata normalizer: raw listing → `AppDocument`.

use keyplan_core::{AppDocument, CompetitorKeywords, Error, Result};
use tracing::debug;

use crate::listing::{extract_app_id, filter_keywords, filter_meta_keywords};
use crate::types::RawListing;

/// Values scrapers emit when a field is missing from the page.
const PLACEHOLDERS: &[&str] = &["not found", "n/a", "none", "null"];

const UNKNOWN_APP_ID: &str = "unknown_id";

/// Normalize a raw listing. Pure; fails only when the title is missing.
pub fn normalize(raw: &RawListing) -> Result<AppDocument> {
    let title = clean_field(raw.title.as_deref());
    if title.is_empty() {
        return Err(Error::MalformedInput("listing has no title".into()));
    }
    let subtitle = clean_field(raw.subtitle.as_deref());
    let description = clean_field(raw.description.as_deref());
    let category = clean_field(raw.category.as_deref());

    let app_id = match raw.app_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => raw
            .app_url
            .as_deref()
            .and_then(|url| extract_app_id(url).ok())
            .unwrap_or_else(|| UNKNOWN_APP_ID.to_string()),
    };

    let mut existing_keywords = filter_keywords(
        raw.keywords.iter().map(String::as_str),
        &title,
        &subtitle,
    );
    if let Some(meta) = raw.meta_keywords.as_deref() {
        for kw in filter_meta_keywords(meta, &title, &subtitle) {
            if !existing_keywords.contains(&kw) {
                existing_keywords.push(kw);
            }
        }
    }

    let competitors: Vec<CompetitorKeywords> = raw
        .competitors
        .iter()
        .filter_map(|c| {
            let name = clean_field(Some(&c.name));
            if name.is_empty() {
                return None;
            }
            let keywords = filter_keywords(c.keywords.iter().map(String::as_str), &name, "");
            Some(CompetitorKeywords { name, keywords })
        })
        .collect();

    debug!(
        "Normalized listing {}: {} existing keywords, {} competitors",
        app_id,
        existing_keywords.len(),
        competitors.len()
    );

    Ok(AppDocument {
        app_id,
        title,
        subtitle,
        description,
        category,
        existing_keywords,
        competitors,
    })
}

/// Parse a JSON listing payload and normalize it.
pub fn normalize_json(payload: &str) -> Result<AppDocument> {
    let raw: RawListing = serde_json::from_str(payload)
        .map_err(|e| Error::MalformedInput(format!("unparseable listing payload: {}", e)))?;
    normalize(&raw)
}

/// Decode common HTML entities, collapse whitespace, blank out placeholders.
fn clean_field(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let decoded = decode_entities(value);
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    if PLACEHOLDERS.contains(&collapsed.to_lowercase().as_str()) {
        return String::new();
    }
    collapsed
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
