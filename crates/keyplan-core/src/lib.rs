//! Keyplan Core: data model, pipeline options, error taxonomy.

pub mod config;
pub mod error;
pub mod types;

pub use config::{KeyplanConfig, PipelineOptions, ScoreWeights};
pub use error::{Error, ErrorKind, Result};
pub use types::{normalize_phrase, AppDocument, Candidate, CandidateSource, CompetitorKeywords};
