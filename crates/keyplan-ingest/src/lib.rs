//! Keyplan Ingest: listing sources, URL helpers, metadata normalization.

pub mod listing;
pub mod normalize;
pub mod source;
pub mod types;

pub use listing::{extract_app_id, filter_meta_keywords, prepare_store_url, resolve_app_id};
pub use normalize::{normalize, normalize_json};
pub use source::{ItunesListingSource, ListingSource, StaticListingSource};
pub use types::RawListing;
