//! Similarity index factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::domain::semantic_cache::{DistanceMetric, SimilarityIndex};
use crate::domain::{Clock, DomainError, SystemClock};

use super::in_memory::{InMemoryIndexConfig, InMemorySimilarityIndex};
use super::redis::{RedisIndexConfig, RedisSimilarityIndex};

/// Supported index backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// In-process index using moka
    #[default]
    InMemory,
    /// Redis Stack with RediSearch
    Redis,
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::InMemory => write!(f, "in_memory"),
            IndexType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for IndexType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(IndexType::InMemory),
            "redis" => Ok(IndexType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown index type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the index factory
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub index_type: IndexType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    pub name: String,
    pub prefix: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
    /// Maximum entries (in-memory only)
    pub max_entries: u64,
    /// KNN candidates per query (Redis only)
    pub candidate_limit: usize,
    pub connection_timeout: Duration,
}

impl IndexConfig {
    /// Creates a new configuration for an in-memory index
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            index_type: IndexType::InMemory,
            redis_url: None,
            name: "semcache".to_string(),
            prefix: "semcache:".to_string(),
            dimensions,
            metric: DistanceMetric::default(),
            max_entries: 10_000,
            candidate_limit: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }

    /// Creates a new configuration for a Redis index
    pub fn redis(url: impl Into<String>, dimensions: usize) -> Self {
        Self {
            index_type: IndexType::Redis,
            redis_url: Some(url.into()),
            ..Self::in_memory(dimensions)
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }
}

/// Factory for creating similarity index instances
#[derive(Debug)]
pub struct SimilarityIndexFactory {
    clock: Arc<dyn Clock>,
}

impl SimilarityIndexFactory {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Creates an index instance based on configuration
    pub async fn create(
        &self,
        config: &IndexConfig,
    ) -> Result<Arc<dyn SimilarityIndex>, DomainError> {
        info!(
            backend = %config.index_type,
            dimensions = config.dimensions,
            metric = %config.metric,
            "Creating similarity index"
        );

        match config.index_type {
            IndexType::InMemory => {
                let in_memory_config = InMemoryIndexConfig::new(config.dimensions)
                    .with_metric(config.metric)
                    .with_max_entries(config.max_entries);

                let index =
                    InMemorySimilarityIndex::with_clock(in_memory_config, self.clock.clone())?;
                Ok(Arc::new(index))
            }
            IndexType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for Redis index type")
                })?;

                let redis_config = RedisIndexConfig::new(url, config.dimensions)
                    .with_name(config.name.clone())
                    .with_prefix(config.prefix.clone())
                    .with_metric(config.metric)
                    .with_candidate_limit(config.candidate_limit)
                    .with_connection_timeout(config.connection_timeout);

                let index =
                    RedisSimilarityIndex::connect_with_clock(redis_config, self.clock.clone())
                        .await?;
                Ok(Arc::new(index))
            }
        }
    }
}

impl Default for SimilarityIndexFactory {
    fn default() -> Self {
        Self::new()
    }
}
