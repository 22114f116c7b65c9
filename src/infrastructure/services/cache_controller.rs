//! Semantic cache controller
//!
//! Orchestrates lookup-before-work and store-after-work for one
//! [`CachePolicy`]. Every infrastructure failure (embedding, index,
//! timeout) fails open: `lookup` degrades to a miss and `store` to a
//! no-op, so the cache can never turn a successful call into a failure.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::semantic_cache::{
    CacheEntry, CacheHit, CacheMiss, CachePolicy, CacheResult, CacheableCall, Fingerprint,
    NotCacheable, PendingWrite, SimilarityIndex,
};
use crate::domain::{Clock, DomainError, SystemClock};
use crate::infrastructure::observability::{
    record_cache_lookup, record_cache_store, register_cache_info, LookupOutcome, StoreOutcome,
};

/// Upper bounds on the two network-bound steps of a lookup or store
#[derive(Debug, Clone, Copy)]
pub struct CacheTimeouts {
    pub embedding: Duration,
    pub index: Duration,
}

impl Default for CacheTimeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(5),
            index: Duration::from_secs(2),
        }
    }
}

/// Optional wiring for [`CacheController::with_options`]
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Embedding model to request; the vectorizer's default when unset
    pub embedding_model: Option<String>,
    pub timeouts: CacheTimeouts,
    pub clock: Arc<dyn Clock>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            embedding_model: None,
            timeouts: CacheTimeouts::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl ControllerOptions {
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: CacheTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Policy enforcement in front of one similarity index
pub struct CacheController {
    index: Arc<dyn SimilarityIndex>,
    vectorizer: Arc<dyn EmbeddingProvider>,
    policy: CachePolicy,
    embedding_model: String,
    timeouts: CacheTimeouts,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CacheController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheController")
            .field("policy", &self.policy)
            .field("index", &self.index.backend())
            .field("vectorizer", &self.vectorizer.provider_name())
            .field("embedding_model", &self.embedding_model)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl CacheController {
    /// Create a controller, validating the policy and vector dimensions
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        vectorizer: Arc<dyn EmbeddingProvider>,
        policy: CachePolicy,
    ) -> Result<Self, DomainError> {
        Self::with_options(index, vectorizer, policy, ControllerOptions::default())
    }

    pub fn with_options(
        index: Arc<dyn SimilarityIndex>,
        vectorizer: Arc<dyn EmbeddingProvider>,
        policy: CachePolicy,
        options: ControllerOptions,
    ) -> Result<Self, DomainError> {
        policy.validate(index.metric())?;

        let embedding_model = options
            .embedding_model
            .unwrap_or_else(|| vectorizer.default_model().to_string());

        let vector_dims = vectorizer.dimensions(&embedding_model).ok_or_else(|| {
            DomainError::configuration(format!(
                "Embedding provider '{}' does not report dimensions for model '{}'",
                vectorizer.provider_name(),
                embedding_model
            ))
        })?;

        if vector_dims != index.dimensions() {
            return Err(DomainError::configuration(format!(
                "Embedding model '{}' produces {} dimensions but the {} index expects {}",
                embedding_model,
                vector_dims,
                index.backend(),
                index.dimensions()
            )));
        }

        register_cache_info(&policy.name, index.backend());

        Ok(Self {
            index,
            vectorizer,
            policy,
            embedding_model,
            timeouts: options.timeouts,
            clock: options.clock,
        })
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn name(&self) -> &str {
        &self.policy.name
    }

    pub fn index(&self) -> &Arc<dyn SimilarityIndex> {
        &self.index
    }

    /// Look up a previously stored payload for `call`
    pub async fn lookup<C: CacheableCall + ?Sized>(&self, call: &C) -> CacheResult {
        let started = Instant::now();

        let fingerprint = match self.fingerprint(call) {
            Ok(fingerprint) => fingerprint,
            Err(reason) => {
                debug!(
                    cache = %self.name(),
                    %reason,
                    call = %call.describe(),
                    "Call not cacheable"
                );
                record_cache_lookup(
                    self.name(),
                    LookupOutcome::NotCacheable,
                    None,
                    started.elapsed(),
                );
                return CacheResult::Miss(CacheMiss::not_cacheable(reason));
            }
        };

        let vector = match self.embed(&fingerprint.discriminant).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(cache = %self.name(), error = %e, "Embedding failed, bypassing cache");
                record_cache_lookup(self.name(), LookupOutcome::Error, None, started.elapsed());
                return CacheResult::Miss(CacheMiss::not_cacheable(
                    NotCacheable::EmbeddingUnavailable,
                ));
            }
        };

        let query = self.index.query(
            &vector,
            &fingerprint.scope,
            self.policy.distance_threshold,
        );
        let found = match tokio::time::timeout(self.timeouts.index, query).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::timeout(format!(
                "Index query exceeded {:?}",
                self.timeouts.index
            ))),
        };

        match found {
            Ok(Some(matched)) => {
                info!(
                    cache = %self.name(),
                    distance = matched.distance,
                    key = %matched.entry.key(),
                    call = %call.describe(),
                    "Semantic cache hit"
                );
                record_cache_lookup(
                    self.name(),
                    LookupOutcome::Hit,
                    Some(matched.distance),
                    started.elapsed(),
                );

                let key = matched.entry.key().to_string();
                let cached_at = matched.entry.created_at();
                CacheResult::Hit(CacheHit {
                    payload: matched.entry.into_payload(),
                    distance: matched.distance,
                    key,
                    cached_at,
                })
            }
            Ok(None) => {
                debug!(cache = %self.name(), call = %call.describe(), "Semantic cache miss");
                record_cache_lookup(self.name(), LookupOutcome::Miss, None, started.elapsed());
                CacheResult::Miss(CacheMiss::cacheable(PendingWrite {
                    fingerprint,
                    vector,
                }))
            }
            Err(e) => {
                warn!(cache = %self.name(), error = %e, "Index query failed, bypassing cache");
                record_cache_lookup(self.name(), LookupOutcome::Error, None, started.elapsed());
                CacheResult::Miss(CacheMiss::not_cacheable(NotCacheable::IndexUnavailable))
            }
        }
    }

    /// Store the real result of a call that missed
    ///
    /// Reuses the fingerprint and vector computed by `lookup`. A miss that
    /// was not cacheable makes this a no-op. Write failures are logged and
    /// reported through the returned outcome, never raised.
    pub async fn store(&self, miss: CacheMiss, payload: Value) -> StoreOutcome {
        match miss.into_pending() {
            Some(pending) => self.write(pending, payload).await,
            None => {
                record_cache_store(self.name(), StoreOutcome::Skipped);
                StoreOutcome::Skipped
            }
        }
    }

    /// Store a result for `call`, fingerprinting and embedding it again
    pub async fn store_call<C: CacheableCall + ?Sized>(
        &self,
        call: &C,
        payload: Value,
    ) -> StoreOutcome {
        let miss = self.prepare_store(call).await;
        self.store(miss, payload).await
    }

    /// Build what `store` needs for `call` without querying the index
    pub async fn prepare_store<C: CacheableCall + ?Sized>(&self, call: &C) -> CacheMiss {
        let fingerprint = match self.fingerprint(call) {
            Ok(fingerprint) => fingerprint,
            Err(reason) => {
                debug!(
                    cache = %self.name(),
                    %reason,
                    call = %call.describe(),
                    "Call not cacheable"
                );
                return CacheMiss::not_cacheable(reason);
            }
        };

        match self.embed(&fingerprint.discriminant).await {
            Ok(vector) => CacheMiss::cacheable(PendingWrite {
                fingerprint,
                vector,
            }),
            Err(e) => {
                warn!(
                    cache = %self.name(),
                    error = %e,
                    "Embedding failed, result will not be cached"
                );
                CacheMiss::not_cacheable(NotCacheable::EmbeddingUnavailable)
            }
        }
    }

    /// Remove every entry from the underlying index
    pub async fn clear(&self) -> Result<(), DomainError> {
        self.index.clear().await
    }

    pub async fn size(&self) -> Result<usize, DomainError> {
        self.index.size().await
    }

    pub async fn purge_expired(&self) -> Result<usize, DomainError> {
        self.index.purge_expired().await
    }

    fn fingerprint<C: CacheableCall + ?Sized>(
        &self,
        call: &C,
    ) -> Result<Fingerprint, NotCacheable> {
        if !self.policy.enabled {
            return Err(NotCacheable::Disabled);
        }
        call.fingerprint(&self.policy)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let request = EmbeddingRequest::single(&self.embedding_model, text);

        let response = tokio::time::timeout(self.timeouts.embedding, self.vectorizer.embed(request))
            .await
            .map_err(|_| {
                DomainError::timeout(format!(
                    "Embedding exceeded {:?}",
                    self.timeouts.embedding
                ))
            })??;

        let vector = response.into_first_vector().ok_or_else(|| {
            DomainError::provider(self.vectorizer.provider_name(), "No embedding returned")
        })?;

        if vector.len() != self.index.dimensions() {
            return Err(DomainError::provider(
                self.vectorizer.provider_name(),
                format!(
                    "Embedding has {} dimensions, index expects {}",
                    vector.len(),
                    self.index.dimensions()
                ),
            ));
        }

        Ok(vector)
    }

    async fn write(&self, pending: PendingWrite, payload: Value) -> StoreOutcome {
        let PendingWrite {
            fingerprint,
            vector,
        } = pending;
        let key = fingerprint.key.clone();
        let entry = CacheEntry::new(
            fingerprint,
            vector,
            payload,
            self.clock.now_millis(),
            self.policy.ttl_seconds,
        );

        let upsert = self.index.upsert(entry);
        let result = match tokio::time::timeout(self.timeouts.index, upsert).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::timeout(format!(
                "Index write exceeded {:?}",
                self.timeouts.index
            ))),
        };

        let outcome = match result {
            Ok(()) => {
                info!(
                    cache = %self.name(),
                    %key,
                    ttl_seconds = self.policy.ttl_seconds,
                    "Stored cache entry"
                );
                StoreOutcome::Stored
            }
            Err(e) => {
                warn!(cache = %self.name(), %key, error = %e, "Failed to store cache entry");
                StoreOutcome::Error
            }
        };

        record_cache_store(self.name(), outcome);
        outcome
    }
}
