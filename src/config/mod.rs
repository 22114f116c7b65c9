//! Layered application configuration

mod app_config;

pub use app_config::{
    AppConfig, EmbeddingProviderKind, EmbeddingSettings, IndexSettings, LogFormat, LoggingConfig,
    PolicySettings,
};
