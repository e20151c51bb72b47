//! Consolidation: merge signals, collapse near-duplicates, rank.
//!
//! All three stages are pure functions over the per-run candidate set, so
//! the same inputs always produce the same ordered list.

pub mod dedup;
pub mod merge;
pub mod rank;
pub mod types;

pub use dedup::deduplicate;
pub use merge::{frequency_scores, merge_signals};
pub use rank::rank;
pub use types::*;
