//! Infrastructure layer - Index, embedding and cache service implementations

pub mod embedding;
pub mod http_client;
pub mod logging;
pub mod observability;
pub mod semantic_cache;
pub mod services;
