use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::domain::semantic_cache::{CachePolicy, DistanceMetric};
use crate::infrastructure::semantic_cache::{IndexConfig, IndexType};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub llm_cache: PolicySettings,
    #[serde(default)]
    pub tool_cache: PolicySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where entries live and how they are compared
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexType,
    pub redis_url: Option<String>,
    pub name: String,
    pub prefix: String,
    /// Defaults to what the embedding provider reports
    pub dimensions: Option<usize>,
    pub metric: DistanceMetric,
    pub max_entries: u64,
    pub candidate_limit: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Offline feature-hashing embedder
    #[default]
    Local,
    /// OpenAI-compatible `/v1/embeddings` API
    Openai,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    /// Defaults to the provider's default model
    pub model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub dimensions: Option<usize>,
    pub timeout_ms: u64,
}

/// Overrides applied on top of a cache's built-in policy defaults
///
/// Every field is optional so that a partially filled section keeps the
/// defaults of the cache it configures (for example the tool cache keeps
/// `first_message_only = false` unless told otherwise).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub enabled: Option<bool>,
    pub name: Option<String>,
    pub distance_threshold: Option<f32>,
    pub ttl_seconds: Option<u64>,
    pub include_app_name: Option<bool>,
    pub include_user_id: Option<bool>,
    pub include_session_id: Option<bool>,
    pub first_message_only: Option<bool>,
    pub eligible_tool_names: Option<BTreeSet<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexType::default(),
            redis_url: None,
            name: "semcache".to_string(),
            prefix: "semcache:".to_string(),
            dimensions: None,
            metric: DistanceMetric::default(),
            max_entries: 10_000,
            candidate_limit: 10,
            timeout_ms: 2_000,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            dimensions: None,
            timeout_ms: 5_000,
        }
    }
}

impl IndexSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Factory configuration for an index of `dimensions`
    pub fn to_index_config(&self, dimensions: usize) -> IndexConfig {
        let mut config = IndexConfig::in_memory(dimensions)
            .with_name(self.name.clone())
            .with_prefix(self.prefix.clone())
            .with_metric(self.metric)
            .with_max_entries(self.max_entries)
            .with_candidate_limit(self.candidate_limit);
        config.index_type = self.backend;
        config.redis_url = self.redis_url.clone();
        config.connection_timeout = self.timeout();
        config
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PolicySettings {
    /// Apply the overrides to `base`
    pub fn apply(&self, base: CachePolicy) -> CachePolicy {
        let mut policy = base;

        if let Some(enabled) = self.enabled {
            policy.enabled = enabled;
        }
        if let Some(name) = &self.name {
            policy.name = name.clone();
        }
        if let Some(threshold) = self.distance_threshold {
            policy.distance_threshold = threshold;
        }
        if let Some(ttl) = self.ttl_seconds {
            policy.ttl_seconds = ttl;
        }
        if let Some(include) = self.include_app_name {
            policy.scope_flags.include_app_name = include;
        }
        if let Some(include) = self.include_user_id {
            policy.scope_flags.include_user_id = include;
        }
        if let Some(include) = self.include_session_id {
            policy.scope_flags.include_session_id = include;
        }
        if let Some(first_only) = self.first_message_only {
            policy.first_message_only = first_only;
        }
        if let Some(tools) = &self.eligible_tool_names {
            policy.eligible_tool_names = tools.clone();
        }

        policy
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("SEMCACHE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("tool_cache.eligible_tool_names")
                    .with_list_parse_key("llm_cache.eligible_tool_names"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Cross-section checks that no single policy can make on its own
    ///
    /// The policy name namespaces entry keys and the index, so the two
    /// caches must not share one.
    pub fn validate(&self) -> Result<(), DomainError> {
        let llm = self.llm_policy();
        let tool = self.tool_policy();

        if llm.name.trim().is_empty() || tool.name.trim().is_empty() {
            return Err(DomainError::configuration("Cache policy names must not be empty"));
        }

        if llm.name == tool.name {
            return Err(DomainError::configuration(format!(
                "llm_cache and tool_cache must have different names, both are '{}'",
                llm.name
            )));
        }

        Ok(())
    }

    /// Policy of the model response cache
    pub fn llm_policy(&self) -> CachePolicy {
        self.llm_cache.apply(CachePolicy::new())
    }

    /// Policy of the tool result cache
    pub fn tool_policy(&self) -> CachePolicy {
        self.tool_cache.apply(CachePolicy::for_tools())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn from_toml(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.index.backend, IndexType::InMemory);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Local);

        let llm = config.llm_policy();
        assert_eq!(llm.name, "llm");
        assert!((llm.distance_threshold - 0.1).abs() < f32::EPSILON);
        assert_eq!(llm.ttl_seconds, 3600);
        assert!(llm.first_message_only);
        assert!(llm.scope_flags.include_app_name);
        assert!(llm.scope_flags.include_user_id);
        assert!(!llm.scope_flags.include_session_id);

        let tool = config.tool_policy();
        assert_eq!(tool.name, "tool");
        assert!(!tool.first_message_only);
        assert!(tool.eligible_tool_names.is_empty());
    }

    #[test]
    fn test_partial_sections_keep_cache_defaults() {
        let config = from_toml(
            r#"
            [index]
            backend = "redis"
            redis_url = "redis://cache:6379"
            metric = "ip"

            [tool_cache]
            ttl_seconds = 600
            eligible_tool_names = ["get_weather", "search"]

            [llm_cache]
            distance_threshold = 0.2
            include_session_id = true
            "#,
        );

        let tool = config.tool_policy();
        assert_eq!(tool.name, "tool");
        assert!(!tool.first_message_only);
        assert_eq!(tool.ttl_seconds, 600);
        assert!(tool.is_tool_eligible("search"));

        let llm = config.llm_policy();
        assert!((llm.distance_threshold - 0.2).abs() < f32::EPSILON);
        assert!(llm.scope_flags.include_session_id);

        let index = config.index.to_index_config(384);
        assert_eq!(index.index_type, IndexType::Redis);
        assert_eq!(index.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(index.metric, DistanceMetric::InnerProduct);
        assert_eq!(index.dimensions, 384);
    }

    #[test]
    fn test_log_format() {
        let config = from_toml(
            r#"
            [logging]
            level = "debug"
            format = "json"
            "#,
        );

        assert!(matches!(config.logging.format, LogFormat::Json));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_logging_section_keeps_defaults() {
        let config = from_toml(
            r#"
            [logging]
            format = "json"
            "#,
        );

        assert!(matches!(config.logging.format, LogFormat::Json));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_duplicate_policy_names_rejected() {
        assert!(AppConfig::default().validate().is_ok());

        let config = from_toml(
            r#"
            [llm_cache]
            name = "shared"

            [tool_cache]
            name = "shared"
            "#,
        );

        assert!(config.validate().unwrap_err().is_configuration());
    }
}
