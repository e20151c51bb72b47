//! Orchestrator: drives a keyword-planning run through every stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use keyplan_consolidate::{deduplicate, merge_signals, rank, CandidateSignals, ScoredCandidate};
use keyplan_core::{Error, PipelineOptions, Result};
use keyplan_infer::{cosine_similarity, EmbedderBackend, EmbeddingOwner, EmbeddingResolver};
use keyplan_ingest::{normalize, ListingSource, RawListing};
use keyplan_llm::{CandidateSynthesizer, LanguageModel, DEFAULT_TEMPERATURE};
use keyplan_resolve::{RetrievalMatch, SimilarityRetriever, VectorIndex};
use ndarray::Array1;
use tracing::{debug, error, info, warn};

use crate::types::{RunReport, RunStats};

/// Outcome of the embed-then-retrieve job for one candidate.
enum CandidateOutcome {
    Resolved {
        vector: Array1<f32>,
        matches: Vec<RetrievalMatch>,
        retrieval_failed: bool,
    },
    EmbeddingFailed(Error),
}

/// The keyword pipeline with its external collaborators.
///
/// Holds no per-run state; every run builds its own embedding cache.
pub struct Pipeline {
    source: Arc<dyn ListingSource>,
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn EmbedderBackend>,
    index: Arc<dyn VectorIndex>,
    temperature: f64,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ListingSource>,
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbedderBackend>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            source,
            model,
            embedder,
            index,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Sampling temperature for the candidate prompt.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Run the pipeline for a store URL or numeric app id.
    pub async fn run(&self, app_identifier: &str, options: &PipelineOptions) -> Result<Vec<ScoredCandidate>> {
        Ok(self.run_with_report(app_identifier, options).await?.keywords)
    }

    /// Run the pipeline and return the ranked keywords with run counters.
    pub async fn run_with_report(&self, app_identifier: &str, options: &PipelineOptions) -> Result<RunReport> {
        options.validate()?;
        let started = Instant::now();
        info!("Starting run for {} (country={})", app_identifier, options.country);

        with_deadline(options, async {
            let raw = self.source.fetch(app_identifier, &options.country).await?;
            self.execute(&raw, options, started).await
        })
        .await
    }

    /// Run the pipeline on a listing that has already been fetched.
    pub async fn run_document(&self, raw: &RawListing, options: &PipelineOptions) -> Result<RunReport> {
        options.validate()?;
        let started = Instant::now();
        with_deadline(options, self.execute(raw, options, started)).await
    }

    async fn execute(&self, raw: &RawListing, options: &PipelineOptions, started: Instant) -> Result<RunReport> {
        let doc = normalize(raw)?;
        info!("Normalized listing {} ({:?})", doc.app_id, doc.title);

        let synthesis = CandidateSynthesizer::new(Arc::clone(&self.model))
            .with_temperature(self.temperature)
            .synthesize(&doc, options.candidate_count)
            .await?;
        let candidates = synthesis.candidates;

        let resolver = Arc::new(EmbeddingResolver::new(Arc::clone(&self.embedder)));
        let retriever = Arc::new(SimilarityRetriever::new(
            Arc::clone(&self.index),
            options.similarity_floor,
        ));

        let document_vector = match resolver
            .embed(EmbeddingOwner::Document(doc.app_id.clone()), &doc.embedding_text())
            .await
        {
            Ok(v) => Some(v.values),
            Err(e) => {
                warn!("Document embedding failed, affinity omitted: {}", e);
                None
            }
        };

        // Bounded pool; completion order is arbitrary, so re-sort afterwards.
        let top_k = options.top_k_per_candidate;
        let jobs = candidates.iter().enumerate().map(|(idx, candidate)| {
            let resolver = Arc::clone(&resolver);
            let retriever = Arc::clone(&retriever);
            let phrase = candidate.phrase.clone();
            async move {
                let outcome = resolve_candidate(&resolver, &retriever, idx, &phrase, top_k).await;
                (idx, outcome)
            }
        }).collect::<Vec<_>>();
        let mut outcomes: Vec<(usize, CandidateOutcome)> = stream::iter(jobs)
            .buffer_unordered(options.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(idx, _)| *idx);

        let mut stats = RunStats {
            candidates: candidates.len(),
            parse_rejects: synthesis.rejects.len(),
            ..Default::default()
        };
        let mut signals = Vec::with_capacity(candidates.len());
        let mut embeddings = Vec::with_capacity(candidates.len());
        let mut last_embedding_error = None;

        for ((_, outcome), candidate) in outcomes.into_iter().zip(candidates) {
            match outcome {
                CandidateOutcome::Resolved {
                    vector,
                    matches,
                    retrieval_failed,
                } => {
                    if retrieval_failed {
                        stats.retrieval_failures += 1;
                    }
                    let document_affinity = document_vector
                        .as_ref()
                        .map(|d| cosine_similarity(d, &vector));
                    signals.push(CandidateSignals {
                        candidate,
                        matches,
                        document_affinity,
                    });
                    embeddings.push(vector);
                }
                CandidateOutcome::EmbeddingFailed(e) => {
                    stats.embedding_failures += 1;
                    last_embedding_error = Some(e);
                }
            }
        }

        if signals.is_empty() {
            let cause = last_embedding_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidates".into());
            error!("Every candidate embedding failed ({}): {}", stats.candidates, cause);
            return Err(Error::Embedding(format!(
                "all {} candidate embeddings failed: {}",
                stats.candidates, cause
            )));
        }
        if stats.retrieval_failures > 0 && stats.retrieval_failures == signals.len() {
            error!("Retrieval failed for every candidate; ranking on model confidence only");
        }

        let mut scored = merge_signals(signals, &options.score_weights);
        let clusters = deduplicate(&mut scored, &embeddings, options.dedup_threshold);
        let keywords = rank(&clusters, &scored, options.result_limit);

        stats.clusters = clusters.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Run complete for {}: candidates={}, clusters={}, returned={}, embedding_failures={}, retrieval_failures={}, duration={}ms",
            doc.app_id,
            stats.candidates,
            stats.clusters,
            keywords.len(),
            stats.embedding_failures,
            stats.retrieval_failures,
            stats.duration_ms
        );

        Ok(RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            app_id: doc.app_id,
            keywords,
            stats,
        })
    }
}

async fn resolve_candidate(
    resolver: &EmbeddingResolver,
    retriever: &SimilarityRetriever,
    idx: usize,
    phrase: &str,
    top_k: usize,
) -> CandidateOutcome {
    let vector = match resolver.embed(EmbeddingOwner::Candidate(idx), phrase).await {
        Ok(v) => v.values,
        Err(e) => {
            warn!("Embedding failed for {:?}, dropping candidate: {}", phrase, e);
            return CandidateOutcome::EmbeddingFailed(e);
        }
    };

    match retriever.retrieve(idx, &vector, top_k).await {
        Ok(matches) => {
            debug!("Candidate {} ({:?}): {} matches", idx, phrase, matches.len());
            CandidateOutcome::Resolved {
                vector,
                matches,
                retrieval_failed: false,
            }
        }
        Err(e) => {
            warn!("Retrieval failed for {:?}, scoring without matches: {}", phrase, e);
            CandidateOutcome::Resolved {
                vector,
                matches: Vec::new(),
                retrieval_failed: true,
            }
        }
    }
}

/// Apply the run deadline. On expiry the in-flight work is dropped.
async fn with_deadline<F>(options: &PipelineOptions, run: F) -> Result<RunReport>
where
    F: std::future::Future<Output = Result<RunReport>>,
{
    let limit = Duration::from_secs(options.timeout_seconds);
    match tokio::time::timeout(limit, run).await {
        Ok(result) => result,
        Err(_) => {
            error!("Run exceeded {}s deadline", options.timeout_seconds);
            Err(Error::PipelineTimeout(options.timeout_seconds))
        }
    }
}
