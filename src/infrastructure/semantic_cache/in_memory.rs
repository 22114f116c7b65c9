//! In-memory similarity index implementation using moka

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use tracing::debug;

use crate::domain::semantic_cache::{
    nearest_within, CacheEntry, CacheScope, Candidate, DistanceMetric, IndexMatch,
    SimilarityIndex,
};
use crate::domain::{Clock, DomainError, SystemClock};

/// Configuration for the in-memory index
#[derive(Debug, Clone)]
pub struct InMemoryIndexConfig {
    pub dimensions: usize,
    pub metric: DistanceMetric,
    /// Maximum number of entries before moka starts evicting
    pub max_entries: u64,
}

impl InMemoryIndexConfig {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            metric: DistanceMetric::default(),
            max_entries: 10_000,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Entry stored in moka with its write order
#[derive(Debug, Clone)]
struct StoredEntry {
    entry: Arc<CacheEntry>,
    sequence: u64,
}

/// Evicts each entry after its own TTL
struct EntryTtl;

impl Expiry<String, StoredEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(Duration::from_secs(value.entry.ttl_seconds()))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(Duration::from_secs(value.entry.ttl_seconds()))
    }
}

/// Similarity index held in process memory
///
/// Queries scan the entries of the requested scope linearly, which is fine
/// for development, tests and small single-process deployments. Expiry is
/// enforced twice: moka evicts on its own schedule and every query also
/// checks `created_at + ttl` against the injected clock.
#[derive(Debug)]
pub struct InMemorySimilarityIndex {
    cache: MokaCache<String, StoredEntry>,
    config: InMemoryIndexConfig,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl InMemorySimilarityIndex {
    pub fn new(config: InMemoryIndexConfig) -> Result<Self, DomainError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: InMemoryIndexConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        if config.dimensions == 0 {
            return Err(DomainError::configuration(
                "Index dimensions must be greater than zero",
            ));
        }

        let cache = MokaCache::builder()
            .max_capacity(config.max_entries)
            .expire_after(EntryTtl)
            .build();

        Ok(Self {
            cache,
            config,
            clock,
            sequence: AtomicU64::new(0),
        })
    }

    fn check_dimensions(&self, len: usize) -> Result<(), DomainError> {
        if len != self.config.dimensions {
            return Err(DomainError::validation(format!(
                "Vector has {} dimensions, index expects {}",
                len, self.config.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SimilarityIndex for InMemorySimilarityIndex {
    fn backend(&self) -> &'static str {
        "in_memory"
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), DomainError> {
        self.check_dimensions(entry.vector().len())?;

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let key = entry.key().to_string();
        self.cache
            .insert(
                key,
                StoredEntry {
                    entry: Arc::new(entry),
                    sequence,
                },
            )
            .await;

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        scope: &CacheScope,
        distance_threshold: f32,
    ) -> Result<Option<IndexMatch>, DomainError> {
        self.check_dimensions(vector.len())?;

        let metric = self.config.metric;
        let candidates: Vec<Candidate> = self
            .cache
            .iter()
            .filter(|(_, stored)| stored.entry.scope() == scope)
            .filter_map(|(_, stored)| {
                let distance = metric.distance(vector, stored.entry.vector())?;
                Some(Candidate {
                    entry: stored.entry.as_ref().clone(),
                    distance,
                    sequence: stored.sequence,
                })
            })
            .collect();

        debug!(
            scope = %scope.tag(),
            candidates = candidates.len(),
            "Scanned in-memory index"
        );

        Ok(nearest_within(
            candidates,
            distance_threshold,
            self.clock.now_millis(),
        ))
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        let now = self.clock.now_millis();
        let expired: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(_, stored)| stored.entry.is_expired_at(now))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.cache.invalidate(key.as_str()).await;
        }
        self.cache.run_pending_tasks().await;

        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::mock::ManualClock;
    use crate::domain::semantic_cache::Fingerprint;

    fn entry(text: &str, scope: CacheScope, vector: Vec<f32>, created_at: u64) -> CacheEntry {
        CacheEntry::new(
            Fingerprint::new(text, scope, "llm"),
            vector,
            serde_json::json!({ "answer": text }),
            created_at,
            60,
        )
    }

    fn index_with_clock() -> (InMemorySimilarityIndex, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let index =
            InMemorySimilarityIndex::with_clock(InMemoryIndexConfig::new(2), clock.clone())
                .unwrap();
        (index, clock)
    }

    fn user(id: &str) -> CacheScope {
        CacheScope {
            user_id: Some(id.to_string()),
            ..CacheScope::default()
        }
    }

    #[tokio::test]
    async fn test_exact_vector_hits_at_zero_threshold() {
        let (index, clock) = index_with_clock();
        index
            .upsert(entry("q", CacheScope::global(), vec![0.6, 0.8], clock.now_millis()))
            .await
            .unwrap();

        let found = index
            .query(&[0.6, 0.8], &CacheScope::global(), 0.0)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.distance, 0.0);
        assert_eq!(found.entry.discriminant(), "q");
    }

    #[tokio::test]
    async fn test_scope_must_match_exactly() {
        let (index, clock) = index_with_clock();
        index
            .upsert(entry("q", user("u1"), vec![1.0, 0.0], clock.now_millis()))
            .await
            .unwrap();

        assert!(index.query(&[1.0, 0.0], &user("u1"), 0.1).await.unwrap().is_some());
        assert!(index.query(&[1.0, 0.0], &user("u2"), 0.1).await.unwrap().is_none());
        assert!(index
            .query(&[1.0, 0.0], &CacheScope::global(), 0.1)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned_before_eviction() {
        let (index, clock) = index_with_clock();
        index
            .upsert(entry("q", CacheScope::global(), vec![1.0, 0.0], clock.now_millis()))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(60));

        assert!(index
            .query(&[1.0, 0.0], &CacheScope::global(), 0.1)
            .await
            .unwrap()
            .is_none());
        assert_eq!(index.size().await.unwrap(), 1);
        assert_eq!(index.purge_expired().await.unwrap(), 1);
        assert_eq!(index.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tie_goes_to_latest_write() {
        let (index, clock) = index_with_clock();
        let now = clock.now_millis();
        index
            .upsert(entry("first", CacheScope::global(), vec![1.0, 0.0], now))
            .await
            .unwrap();
        index
            .upsert(entry("second", CacheScope::global(), vec![1.0, 0.0], now))
            .await
            .unwrap();

        let found = index
            .query(&[1.0, 0.0], &CacheScope::global(), 0.1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.entry.discriminant(), "second");
    }

    #[tokio::test]
    async fn test_upsert_same_key_overwrites() {
        let (index, clock) = index_with_clock();
        let now = clock.now_millis();
        index
            .upsert(entry("q", CacheScope::global(), vec![1.0, 0.0], now))
            .await
            .unwrap();
        index
            .upsert(entry("q", CacheScope::global(), vec![1.0, 0.0], now))
            .await
            .unwrap();

        assert_eq!(index.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let (index, clock) = index_with_clock();

        let result = index
            .upsert(entry("q", CacheScope::global(), vec![1.0, 0.0, 0.0], clock.now_millis()))
            .await;
        assert!(result.is_err());

        let result = index.query(&[1.0], &CacheScope::global(), 0.1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (index, clock) = index_with_clock();
        index
            .upsert(entry("a", CacheScope::global(), vec![1.0, 0.0], clock.now_millis()))
            .await
            .unwrap();
        index
            .upsert(entry("b", user("u1"), vec![0.0, 1.0], clock.now_millis()))
            .await
            .unwrap();

        index.clear().await.unwrap();

        assert_eq!(index.size().await.unwrap(), 0);
    }

    #[test]
    fn test_zero_dimensions_is_configuration_error() {
        let error = InMemorySimilarityIndex::new(InMemoryIndexConfig::new(0)).unwrap_err();
        assert!(error.is_configuration());
    }
}
