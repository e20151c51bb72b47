//! Pipeline options and process configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Tolerance for the score weight sum check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weights for the merged score: `llm * w1 + similarity * w2 + frequency * w3`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub llm: f64,
    pub similarity: f64,
    pub frequency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            llm: 0.5,
            similarity: 0.3,
            frequency: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn new(llm: f64, similarity: f64, frequency: f64) -> Self {
        Self {
            llm,
            similarity,
            frequency,
        }
    }

    /// Reject weights that are negative, non-finite or do not sum to 1.0.
    /// Weights are never renormalized.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.llm, self.similarity, self.frequency];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(format!(
                "score weights must be finite and non-negative, got ({}, {}, {})",
                self.llm, self.similarity, self.frequency
            )));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!(
                "score weights must sum to 1.0, got {} ({}, {}, {})",
                sum, self.llm, self.similarity, self.frequency
            )));
        }
        Ok(())
    }
}

/// Options for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Maximum number of phrases requested from the language model.
    pub candidate_count: usize,
    /// Nearest neighbours fetched from the index per candidate.
    pub top_k_per_candidate: usize,
    pub score_weights: ScoreWeights,
    /// Embedding cosine similarity above which two phrases are near-duplicates.
    pub dedup_threshold: f64,
    /// Maximum number of ranked keywords returned.
    pub result_limit: usize,
    /// Run-level deadline.
    pub timeout_seconds: u64,
    /// Concurrent embedding/retrieval calls.
    pub concurrency: usize,
    /// Index matches below this similarity are dropped as noise.
    pub similarity_floor: f64,
    /// Two-letter App Store country code.
    pub country: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            candidate_count: 30,
            top_k_per_candidate: 5,
            score_weights: ScoreWeights::default(),
            dedup_threshold: 0.92,
            result_limit: 30,
            timeout_seconds: 60,
            concurrency: 8,
            similarity_floor: 0.3,
            country: "us".into(),
        }
    }
}

impl PipelineOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: PipelineOptions = serde_json::from_str(&text)?;
        info!("Loaded pipeline options from {}", path.display());
        Ok(options)
    }

    /// Validate every setting. Runs before any external call is made.
    pub fn validate(&self) -> Result<()> {
        self.score_weights.validate()?;

        if !(self.dedup_threshold > 0.0 && self.dedup_threshold < 1.0) {
            return Err(Error::Config(format!(
                "dedup_threshold must be in (0, 1), got {}",
                self.dedup_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_floor) {
            return Err(Error::Config(format!(
                "similarity_floor must be in [0, 1], got {}",
                self.similarity_floor
            )));
        }
        for (name, value) in [
            ("candidate_count", self.candidate_count),
            ("top_k_per_candidate", self.top_k_per_candidate),
            ("result_limit", self.result_limit),
            ("concurrency", self.concurrency),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be at least 1", name)));
            }
        }
        if self.timeout_seconds == 0 {
            return Err(Error::Config("timeout_seconds must be at least 1".into()));
        }
        let country_ok =
            self.country.len() == 2 && self.country.chars().all(|c| c.is_ascii_lowercase());
        if !country_ok {
            return Err(Error::Config(format!(
                "country must be a two-letter lowercase code, got {:?}",
                self.country
            )));
        }
        Ok(())
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyplanConfig {
    /// HTTP server port.
    pub port: u16,
    /// Options used when a request does not carry its own.
    pub default_options: PipelineOptions,
}

impl KeyplanConfig {
    /// Create configuration from environment and defaults.
    ///
    /// `KEYPLAN_OPTIONS` may point at a JSON options file.
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3004);

        let default_options = match std::env::var("KEYPLAN_OPTIONS") {
            Ok(path) => PipelineOptions::from_file(Path::new(&path))?,
            Err(_) => PipelineOptions::default(),
        };
        default_options.validate()?;

        Ok(Self {
            port,
            default_options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_options_are_valid() {
        assert!(PipelineOptions::default().validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let bad = [
            (0.5, 0.3, 0.3),
            (0.0, 0.0, 0.0),
            (1.0, 0.1, 0.0),
            (0.33, 0.33, 0.33),
            (0.5, 0.3, 0.19999),
        ];
        for (a, b, c) in bad {
            let err = ScoreWeights::new(a, b, c).validate().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "({a}, {b}, {c}) accepted");
        }

        let good = [(0.5, 0.3, 0.2), (1.0, 0.0, 0.0), (0.2, 0.2, 0.6)];
        for (a, b, c) in good {
            assert!(ScoreWeights::new(a, b, c).validate().is_ok());
        }
    }

    #[test]
    fn test_weights_within_tolerance() {
        assert!(ScoreWeights::new(0.5, 0.3, 0.2 + 5e-7).validate().is_ok());
        assert!(ScoreWeights::new(0.5, 0.3, 0.2 + 5e-6).validate().is_err());
    }

    #[test]
    fn test_negative_or_nan_weights_rejected() {
        assert!(ScoreWeights::new(1.2, -0.2, 0.0).validate().is_err());
        assert!(ScoreWeights::new(f64::NAN, 0.5, 0.5).validate().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        for threshold in [0.0, 1.0, -0.1, 1.5] {
            let opts = PipelineOptions {
                dedup_threshold: threshold,
                ..Default::default()
            };
            assert!(opts.validate().is_err(), "threshold {threshold} accepted");
        }
    }

    #[test]
    fn test_zero_counts_rejected() {
        let opts = PipelineOptions {
            result_limit: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = PipelineOptions {
            timeout_seconds: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_country_code() {
        let opts = PipelineOptions {
            country: "USA".into(),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"candidateCount": 12, "scoreWeights": {{"llm": 0.6, "similarity": 0.2, "frequency": 0.2}}}}"#
        )
        .unwrap();

        let opts = PipelineOptions::from_file(file.path()).unwrap();
        assert_eq!(opts.candidate_count, 12);
        assert_eq!(opts.score_weights.llm, 0.6);
        assert_eq!(opts.result_limit, 30);
        assert!(opts.validate().is_ok());
    }
}
