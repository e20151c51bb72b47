//! Raw listing payload as delivered by a listing source.

use keyplan_core::CompetitorKeywords;
use serde::{Deserialize, Serialize};

/// Unprocessed listing fields. Every field is optional here; the normalizer
/// decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    #[serde(default, alias = "appid")]
    pub app_id: Option<String>,
    #[serde(default, alias = "appurl")]
    pub app_url: Option<String>,
    #[serde(default, alias = "appname")]
    pub title: Option<String>,
    #[serde(default, alias = "appsubtitle")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated `<meta name="keywords">` content.
    #[serde(default)]
    pub meta_keywords: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, alias = "competitor_apps_keywords")]
    pub competitors: Vec<CompetitorKeywords>,
}
