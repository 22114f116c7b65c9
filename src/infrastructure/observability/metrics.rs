//! Cache metrics
//!
//! Recorded through the `metrics` facade. The host application installs
//! whichever recorder/exporter it uses; without one these calls are no-ops.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Result of a lookup as reported in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Hit,
    Miss,
    NotCacheable,
    Error,
}

impl LookupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOutcome::Hit => "hit",
            LookupOutcome::Miss => "miss",
            LookupOutcome::NotCacheable => "not_cacheable",
            LookupOutcome::Error => "error",
        }
    }
}

/// Result of a store as reported in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    Skipped,
    Error,
}

impl StoreOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOutcome::Stored => "stored",
            StoreOutcome::Skipped => "skipped",
            StoreOutcome::Error => "error",
        }
    }
}

/// Publish a static info gauge for the running cache
pub fn register_cache_info(cache: &str, backend: &str) {
    gauge!(
        "semantic_cache_info",
        "cache" => cache.to_string(),
        "backend" => backend.to_string(),
        "version" => env!("CARGO_PKG_VERSION")
    )
    .set(1.0);
}

/// Record a cache lookup and, on a hit, the matched distance
pub fn record_cache_lookup(
    cache: &str,
    outcome: LookupOutcome,
    distance: Option<f32>,
    duration: Duration,
) {
    let labels = [
        ("cache", cache.to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    counter!("semantic_cache_lookups_total", &labels).increment(1);
    histogram!("semantic_cache_lookup_duration_seconds", &labels)
        .record(duration.as_secs_f64());

    if let Some(distance) = distance {
        histogram!("semantic_cache_hit_distance", "cache" => cache.to_string())
            .record(distance as f64);
    }
}

/// Record a cache store attempt
pub fn record_cache_store(cache: &str, outcome: StoreOutcome) {
    let labels = [
        ("cache", cache.to_string()),
        ("outcome", outcome.as_str().to_string()),
    ];

    counter!("semantic_cache_stores_total", &labels).increment(1);
}
