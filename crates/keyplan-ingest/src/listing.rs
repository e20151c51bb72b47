//! App Store URL and meta-keyword helpers.

use std::collections::HashSet;

use keyplan_core::{normalize_phrase, Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Keywords Apple adds to every listing; they carry no signal.
pub const STOP_KEYWORDS: &[&str] = &[
    "ios apps",
    "app",
    "appstore",
    "app store",
    "iphone",
    "ipad",
    "ipod touch",
    "itouch",
    "itunes",
    "apple",
];

static COUNTRY_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/[a-z]{2}/").unwrap());
static APP_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"id(\d+)").unwrap());

/// Point a store URL at the given country storefront.
///
/// Replaces the first `/xx/` segment, or inserts one after `apps.apple.com/`.
pub fn prepare_store_url(url: &str, country: &str) -> String {
    let segment = format!("/{}/", country.to_lowercase());
    if COUNTRY_SEGMENT.is_match(url) {
        COUNTRY_SEGMENT.replace(url, segment.as_str()).into_owned()
    } else {
        url.replacen("apps.apple.com/", &format!("apps.apple.com{}", segment), 1)
    }
}

/// Extract the numeric app id from a store URL (`.../id1234567890`).
pub fn extract_app_id(url: &str) -> Result<String> {
    APP_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::MalformedInput(format!("no app id in {:?}", url)))
}

/// Resolve an identifier that is either a bare numeric id or a store URL.
pub fn resolve_app_id(identifier: &str) -> Result<String> {
    let trimmed = identifier.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Ok(trimmed.to_string());
    }
    extract_app_id(trimmed)
}

/// Split and clean a comma-separated meta keyword string.
pub fn filter_meta_keywords(raw: &str, title: &str, subtitle: &str) -> Vec<String> {
    let parts: Vec<&str> = raw.split(',').collect();
    filter_keywords(parts, title, subtitle)
}

/// Drop stop keywords, the app's own title/subtitle and duplicates.
pub fn filter_keywords<'a, I>(keywords: I, title: &str, subtitle: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let own_title = normalize_phrase(title);
    let own_subtitle = normalize_phrase(subtitle);
    let mut seen = HashSet::new();

    keywords
        .into_iter()
        .map(normalize_phrase)
        .filter(|k| !k.is_empty())
        .filter(|k| !STOP_KEYWORDS.contains(&k.as_str()))
        .filter(|k| *k != own_title && *k != own_subtitle)
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_url_replaces_country() {
        let url = "https://apps.apple.com/us/app/pixel-runner/id123456";
        assert_eq!(
            prepare_store_url(url, "in"),
            "https://apps.apple.com/in/app/pixel-runner/id123456"
        );
    }

    #[test]
    fn test_prepare_url_inserts_country() {
        let url = "https://apps.apple.com/app/pixel-runner/id123456";
        assert_eq!(
            prepare_store_url(url, "au"),
            "https://apps.apple.com/au/app/pixel-runner/id123456"
        );
    }

    #[test]
    fn test_extract_app_id() {
        let id = extract_app_id("https://apps.apple.com/us/app/pixel-runner/id987654321").unwrap();
        assert_eq!(id, "987654321");
        assert!(extract_app_id("https://apps.apple.com/us/app/pixel-runner").is_err());
    }

    #[test]
    fn test_resolve_app_id_accepts_bare_digits() {
        assert_eq!(resolve_app_id(" 42 ").unwrap(), "42");
        assert!(resolve_app_id("not-an-id").is_err());
    }

    #[test]
    fn test_filter_meta_keywords() {
        let raw = "Pixel Runner, iPhone, endless runner, App Store, Arcade, endless runner, Retro fun";
        let filtered = filter_meta_keywords(raw, "Pixel Runner", "Retro Fun");
        assert_eq!(filtered, vec!["endless runner", "arcade"]);
    }
}
