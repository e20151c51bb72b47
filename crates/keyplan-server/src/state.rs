//! Shared application state and collaborator wiring.

use std::sync::Arc;
use std::time::Duration;

use keyplan_core::{KeyplanConfig, Result};
use keyplan_infer::EmbedderConfig;
use keyplan_ingest::ItunesListingSource;
use keyplan_llm::{HttpLanguageModel, LLMConfig, LanguageModel};
use keyplan_resolve::{EmptyIndex, TypesenseConfig, TypesenseIndex, VectorIndex};
use keyplan_runtime::Pipeline;
use tracing::{info, warn};

const LISTING_TIMEOUT: Duration = Duration::from_secs(15);
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: KeyplanConfig,
    pub llm_config: LLMConfig,
    /// `None` when collaborators could not be configured; runs then fail
    /// with the recorded reason.
    pub pipeline: Option<Pipeline>,
    pub setup_error: Option<String>,
    pub embedder: String,
    pub index: String,
}

impl AppState {
    pub fn new(config: KeyplanConfig, llm_config: LLMConfig) -> Self {
        match build_pipeline(&llm_config) {
            Ok((pipeline, embedder, index)) => Self {
                config,
                llm_config,
                pipeline: Some(pipeline),
                setup_error: None,
                embedder,
                index,
            },
            Err(e) => {
                warn!("Keyword pipeline unavailable: {}", e);
                Self {
                    config,
                    llm_config,
                    pipeline: None,
                    setup_error: Some(e.to_string()),
                    embedder: String::new(),
                    index: String::new(),
                }
            }
        }
    }

    /// State around an already-assembled pipeline.
    pub fn with_pipeline(config: KeyplanConfig, pipeline: Pipeline) -> Self {
        Self {
            config,
            llm_config: LLMConfig::default(),
            pipeline: Some(pipeline),
            setup_error: None,
            embedder: String::new(),
            index: String::new(),
        }
    }
}

/// Assemble the production collaborators from the environment.
///
/// Returns the pipeline plus the embedder and index names for `/api/health`.
pub fn build_pipeline(llm_config: &LLMConfig) -> Result<(Pipeline, String, String)> {
    let source = ItunesListingSource::new(LISTING_TIMEOUT)?;
    let model = HttpLanguageModel::from_config(llm_config, LLM_TIMEOUT)?;
    info!("Language model: {}", model.model_name());

    let embedder = keyplan_infer::create_embedder(&EmbedderConfig::from_env());

    let index: Arc<dyn VectorIndex> = match TypesenseConfig::from_env() {
        Some(cfg) => {
            info!("Vector index: typesense collection {}", cfg.collection);
            Arc::new(TypesenseIndex::new(&cfg)?)
        }
        None => {
            info!("TYPESENSE_HOST not set; similarity retrieval disabled");
            Arc::new(EmptyIndex)
        }
    };

    let embedder_name = embedder.name().to_string();
    let index_name = index.name().to_string();
    let pipeline = Pipeline::new(Arc::new(source), Arc::new(model), embedder, index)
        .with_temperature(llm_config.temperature);
    Ok((pipeline, embedder_name, index_name))
}
