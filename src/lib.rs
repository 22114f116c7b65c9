//! Semantic Call Cache
//!
//! Serves previously computed model responses and tool results for
//! semantically similar calls:
//! - Fingerprinting of model and tool calls with configurable scoping
//! - Pluggable vectorizers (offline hashing model, OpenAI-compatible APIs)
//! - Similarity indexes in process memory or Redis Stack
//! - Before/after hooks that fail open on any infrastructure error

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;

use crate::domain::embedding::EmbeddingProvider;
use crate::domain::semantic_cache::{CachePolicy, SimilarityIndex};
use crate::domain::DomainError;
use crate::infrastructure::embedding::{HttpClient, LocalEmbeddingProvider, OpenAiEmbeddingProvider};
use crate::infrastructure::semantic_cache::SimilarityIndexFactory;
use crate::infrastructure::services::{
    CacheController, CacheTimeouts, ControllerOptions, LlmResponseCache, ToolResultCache,
};
use tracing::info;

/// Both caches, ready to be wired into a host's call path
#[derive(Debug, Clone)]
pub struct Caches {
    pub llm: LlmResponseCache,
    pub tools: ToolResultCache,
}

/// Build the model response cache and the tool result cache from configuration
///
/// Fails with a configuration error when the vectorizer and index disagree
/// on dimensions, a policy is invalid or a required credential is missing.
pub async fn create_caches(config: &AppConfig) -> Result<Caches, DomainError> {
    config.validate()?;

    let vectorizer = create_vectorizer(config)?;
    let model = config
        .embedding
        .model
        .clone()
        .unwrap_or_else(|| vectorizer.default_model().to_string());

    let llm = create_controller(config, vectorizer.clone(), &model, config.llm_policy()).await?;
    let tools = create_controller(config, vectorizer, &model, config.tool_policy()).await?;

    Ok(Caches {
        llm: LlmResponseCache::new(Arc::new(llm)),
        tools: ToolResultCache::new(Arc::new(tools)),
    })
}

/// Create the configured embedding provider
pub fn create_vectorizer(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>, DomainError> {
    let settings = &config.embedding;

    match settings.provider {
        crate::config::EmbeddingProviderKind::Local => {
            let provider = match settings.dimensions {
                Some(dims) => LocalEmbeddingProvider::with_dimensions(dims)?,
                None => LocalEmbeddingProvider::new(),
            };
            info!("Using local embedding provider");
            Ok(Arc::new(provider))
        }
        crate::config::EmbeddingProviderKind::Openai => {
            let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
                DomainError::configuration(format!(
                    "{} environment variable is required for the openai embedding provider",
                    settings.api_key_env
                ))
            })?;
            let client = HttpClient::with_timeout(settings.timeout())?;

            let mut provider = match &settings.base_url {
                Some(url) => {
                    info!("Using OpenAI embedding provider with custom base URL: {}", url);
                    OpenAiEmbeddingProvider::with_base_url(client, api_key, url.clone())
                }
                None => {
                    info!("Using OpenAI embedding provider with default base URL");
                    OpenAiEmbeddingProvider::new(client, api_key)
                }
            };

            if let Some(dims) = settings.dimensions {
                provider = provider.with_dimensions(dims);
            }

            Ok(Arc::new(provider))
        }
    }
}

async fn create_controller(
    config: &AppConfig,
    vectorizer: Arc<dyn EmbeddingProvider>,
    model: &str,
    policy: CachePolicy,
) -> Result<CacheController, DomainError> {
    let dimensions = config
        .index
        .dimensions
        .or_else(|| vectorizer.dimensions(model))
        .ok_or_else(|| {
            DomainError::configuration(format!(
                "Index dimensions are not configured and model '{}' does not report them",
                model
            ))
        })?;

    // One index per cache so model prompts never match tool signatures
    let mut index_config = config.index.to_index_config(dimensions);
    index_config.name = format!("{}-{}", index_config.name, policy.name);
    index_config.prefix = format!("{}{}:", index_config.prefix, policy.name);

    let index: Arc<dyn SimilarityIndex> =
        SimilarityIndexFactory::new().create(&index_config).await?;

    let options = ControllerOptions::default()
        .with_embedding_model(model)
        .with_timeouts(CacheTimeouts {
            embedding: config.embedding.timeout(),
            index: config.index.timeout(),
        });

    CacheController::with_options(index, vectorizer, policy, options)
}
