//! Keyword candidate synthesis with external LLMs (OpenAI/Anthropic/Groq).
//!
//! A single non-streaming completion per run. The output is parsed line by
//! line and malformed lines are reported instead of failing the run.

pub mod config;
pub mod parse;
pub mod providers;
pub mod synthesizer;
pub mod types;

pub use config::LLMConfig;
pub use parse::{parse_candidate_lines, ParseOutcome, ParseReject, ParsedLine};
pub use providers::{HttpLanguageModel, LanguageModel};
pub use synthesizer::{collapse_duplicates, CandidateSynthesizer, SynthesisOutput, DEFAULT_TEMPERATURE};
pub use types::*;
