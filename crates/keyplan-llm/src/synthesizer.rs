//! Candidate synthesizer: app document in, keyword candidates out.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use keyplan_core::{normalize_phrase, AppDocument, Candidate, Error, Result};
use tracing::{debug, info, warn};

use crate::parse::{parse_candidate_lines, ParseReject};
use crate::providers::LanguageModel;
use crate::types::Prompt;

const SYSTEM_PROMPT: &str = "You are an App Store Optimization (ASO) specialist. \
Analyze the iOS app listing you are given and propose search keywords that real users \
would type to find this app. Avoid generic terms such as \"app\", \"free\" or \"iphone\". \
Answer with one keyword per line and nothing else, in the form:\n\
phrase | confidence | intent tags\n\
where confidence is your estimate between 0 and 1 that the phrase is relevant, and \
intent tags is a comma-separated list drawn from: navigational, feature, genre, \
problem, audience, competitor.";

const TOKENS_PER_LINE: usize = 24;

pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Candidates plus the lines the parser could not read.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub candidates: Vec<Candidate>,
    pub rejects: Vec<ParseReject>,
}

/// Produces keyword candidates from a language model.
pub struct CandidateSynthesizer {
    model: Arc<dyn LanguageModel>,
    temperature: f64,
}

impl CandidateSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the prompt for up to `n` phrases.
    pub fn build_prompt(&self, doc: &AppDocument, n: usize) -> Prompt {
        let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };

        let mut user = format!(
            "Return at most {} keywords.\n\nApp Name: {}\nApp Subtitle: {}\nCategory: {}\nDescription: {}\n",
            n,
            doc.title,
            or_na(&doc.subtitle),
            or_na(&doc.category),
            or_na(&doc.description),
        );
        if !doc.existing_keywords.is_empty() {
            user.push_str(&format!("Existing Keywords: {}\n", doc.existing_keywords.join(", ")));
        }
        if !doc.competitors.is_empty() {
            user.push_str("Competitor Apps and their Keywords:\n");
            for comp in &doc.competitors {
                user.push_str(&format!("- {}: {}\n", comp.name, comp.keywords.join(", ")));
            }
        }

        Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
            max_tokens: 256 + n * TOKENS_PER_LINE,
            temperature: self.temperature,
        }
    }

    /// Ask the model for up to `n` candidates.
    ///
    /// Fails with `Generation` when no valid line comes back; rate limiting
    /// from the provider surfaces unchanged as `RateLimited`.
    pub async fn synthesize(&self, doc: &AppDocument, n: usize) -> Result<SynthesisOutput> {
        let prompt = self.build_prompt(doc, n);
        let completion = self.model.complete(&prompt).await?;
        debug!("Completion from {}: {} chars", self.model.model_name(), completion.len());

        let outcome = parse_candidate_lines(&completion);
        for reject in &outcome.rejects {
            debug!("Rejected line {}: {} ({})", reject.line_no, reject.line, reject.reason);
        }

        let candidates = collapse_duplicates(
            outcome
                .entries
                .into_iter()
                .map(|e| (e.phrase, e.confidence, e.tags)),
            n,
        );
        if candidates.is_empty() {
            warn!(
                "Model {} returned no usable keywords ({} lines rejected)",
                self.model.model_name(),
                outcome.rejects.len()
            );
            return Err(Error::Generation(format!(
                "no valid candidates in model output ({} lines rejected)",
                outcome.rejects.len()
            )));
        }

        info!(
            "Synthesized {} candidates for {} ({} lines rejected)",
            candidates.len(),
            doc.app_id,
            outcome.rejects.len()
        );
        Ok(SynthesisOutput {
            candidates,
            rejects: outcome.rejects,
        })
    }
}

struct Accumulator {
    confidence_sum: f64,
    count: usize,
    tags: BTreeSet<String>,
}

/// Merge exact duplicates (after normalization): mean confidence, union of
/// tags. Keeps first-seen order and at most `limit` distinct phrases.
pub fn collapse_duplicates<I>(entries: I, limit: usize) -> Vec<Candidate>
where
    I: IntoIterator<Item = (String, f64, BTreeSet<String>)>,
{
    let mut order: Vec<String> = Vec::new();
    let mut acc: HashMap<String, Accumulator> = HashMap::new();

    for (phrase, confidence, tags) in entries {
        let phrase = normalize_phrase(&phrase);
        if phrase.is_empty() {
            continue;
        }
        match acc.get_mut(&phrase) {
            Some(a) => {
                a.confidence_sum += confidence;
                a.count += 1;
                a.tags.extend(tags);
            }
            None => {
                if order.len() >= limit {
                    continue;
                }
                order.push(phrase.clone());
                acc.insert(
                    phrase,
                    Accumulator {
                        confidence_sum: confidence,
                        count: 1,
                        tags,
                    },
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|phrase| {
            let a = acc.remove(&phrase)?;
            let mean = a.confidence_sum / a.count as f64;
            Some(Candidate::from_llm(&phrase, mean, a.tags))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keyplan_core::CompetitorKeywords;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Option<String>>);

    struct CannedModel {
        output: Result<String>,
        seen: Captured,
    }

    impl CannedModel {
        fn ok(text: &str) -> Self {
            Self {
                output: Ok(text.to_string()),
                seen: Captured::default(),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, prompt: &Prompt) -> Result<String> {
            *self.seen.0.lock().unwrap() = Some(prompt.user.clone());
            match &self.output {
                Ok(s) => Ok(s.clone()),
                Err(Error::RateLimited { message, retry_after_secs }) => Err(Error::RateLimited {
                    message: message.clone(),
                    retry_after_secs: *retry_after_secs,
                }),
                Err(e) => Err(Error::Generation(e.to_string())),
            }
        }
        fn model_name(&self) -> String {
            "canned".into()
        }
    }

    fn doc() -> AppDocument {
        AppDocument {
            app_id: "1".into(),
            title: "Pixel Runner".into(),
            subtitle: String::new(),
            description: "endless runner arcade game".into(),
            category: "Games".into(),
            existing_keywords: vec!["arcade".into()],
            competitors: vec![CompetitorKeywords {
                name: "Rival Dash".into(),
                keywords: vec!["dash".into(), "runner".into()],
            }],
        }
    }

    #[tokio::test]
    async fn test_duplicates_collapse_with_mean_confidence() {
        let model = Arc::new(CannedModel::ok(
            "Endless Runner | 0.9 | genre\nendless  runner | 0.7 | feature\npixel game | 0.7 | genre\n",
        ));
        let synth = CandidateSynthesizer::new(model);
        let out = synth.synthesize(&doc(), 10).await.unwrap();

        assert_eq!(out.candidates.len(), 2);
        let runner = &out.candidates[0];
        assert_eq!(runner.phrase, "endless runner");
        assert!((runner.llm_confidence - 0.8).abs() < 1e-12);
        assert_eq!(runner.intent_tags.len(), 2);
        assert_eq!(out.candidates[1].phrase, "pixel game");
    }

    #[tokio::test]
    async fn test_limit_keeps_first_seen() {
        let model = Arc::new(CannedModel::ok("a | 0.5\nb | 0.6\nc | 0.7\na | 0.9\n"));
        let out = CandidateSynthesizer::new(model).synthesize(&doc(), 2).await.unwrap();
        let phrases: Vec<_> = out.candidates.iter().map(|c| c.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["a", "b"]);
        assert!((out.candidates[0].llm_confidence - 0.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_no_valid_lines_is_generation_error() {
        let model = Arc::new(CannedModel::ok("Sorry, I cannot help with that."));
        let err = CandidateSynthesizer::new(model).synthesize(&doc(), 5).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_passes_through() {
        let model = Arc::new(CannedModel {
            output: Err(Error::RateLimited {
                message: "slow down".into(),
                retry_after_secs: Some(3),
            }),
            seen: Captured::default(),
        });
        let err = CandidateSynthesizer::new(model).synthesize(&doc(), 5).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { retry_after_secs: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_rejects_reported() {
        let model = Arc::new(CannedModel::ok("pixel game | 0.7\ngarbage line\n"));
        let out = CandidateSynthesizer::new(model).synthesize(&doc(), 5).await.unwrap();
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.rejects.len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_includes_context() {
        let model = Arc::new(CannedModel::ok("pixel game | 0.7"));
        let synth = CandidateSynthesizer::new(model.clone());
        synth.synthesize(&doc(), 15).await.unwrap();

        let user = model.seen.0.lock().unwrap().clone().unwrap();
        assert!(user.contains("at most 15 keywords"));
        assert!(user.contains("App Name: Pixel Runner"));
        assert!(user.contains("App Subtitle: N/A"));
        assert!(user.contains("Existing Keywords: arcade"));
        assert!(user.contains("- Rival Dash: dash, runner"));
    }
}
