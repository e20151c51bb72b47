//! Runtime orchestrator: runs one keyword-planning pass end to end.
//!
//! Fetch and normalize the listing, synthesize candidates, embed and
//! retrieve per candidate on a bounded pool, then merge, deduplicate and
//! rank behind a single barrier. The whole run sits under one deadline.

pub mod orchestrator;
pub mod types;

pub use orchestrator::Pipeline;
pub use types::*;
