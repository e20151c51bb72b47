//! Runtime types.

use keyplan_consolidate::ScoredCandidate;
use serde::Serialize;

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Distinct candidates produced by the synthesizer.
    pub candidates: usize,
    /// Model output lines that could not be parsed.
    pub parse_rejects: usize,
    pub embedding_failures: usize,
    pub retrieval_failures: usize,
    pub clusters: usize,
    pub duration_ms: u64,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub app_id: String,
    pub keywords: Vec<ScoredCandidate>,
    pub stats: RunStats,
}
