//! Redis similarity index backed by RediSearch vector search

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Value};
use tracing::{debug, info};

use crate::domain::semantic_cache::{
    nearest_within, CacheEntry, CacheScope, Candidate, DistanceMetric, IndexMatch,
    SimilarityIndex,
};
use crate::domain::{Clock, DomainError, SystemClock};

const FIELD_KEY: &str = "key";
const FIELD_SCOPE_TAG: &str = "scope";
const FIELD_SCOPE: &str = "scope_json";
const FIELD_VECTOR: &str = "vector";
const FIELD_DISCRIMINANT: &str = "discriminant";
const FIELD_PAYLOAD: &str = "payload";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_TTL: &str = "ttl_seconds";
const FIELD_SEQUENCE: &str = "sequence";
const FIELD_EXPIRES_AT: &str = "expires_at";

/// Upper bound for the widened KNN window
const MAX_CANDIDATES: usize = 1024;

const RETURN_FIELDS: &[&str] = &[
    FIELD_KEY,
    FIELD_SCOPE,
    FIELD_VECTOR,
    FIELD_DISCRIMINANT,
    FIELD_PAYLOAD,
    FIELD_CREATED_AT,
    FIELD_TTL,
    FIELD_SEQUENCE,
];

/// Configuration for the Redis index
#[derive(Debug, Clone)]
pub struct RedisIndexConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// RediSearch index name
    pub name: String,
    /// Key prefix for every key the index owns
    pub prefix: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
    /// KNN candidates fetched per query before client-side selection
    pub candidate_limit: usize,
    pub connection_timeout: Duration,
}

impl RedisIndexConfig {
    pub fn new(url: impl Into<String>, dimensions: usize) -> Self {
        Self {
            url: url.into(),
            name: "semcache".to_string(),
            prefix: "semcache:".to_string(),
            dimensions,
            metric: DistanceMetric::default(),
            candidate_limit: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit.max(1);
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    fn entry_prefix(&self) -> String {
        format!("{}entry:", self.prefix)
    }

    fn meta_key(&self) -> String {
        format!("{}meta", self.prefix)
    }

    fn sequence_key(&self) -> String {
        format!("{}seq", self.prefix)
    }
}

/// Similarity index stored in Redis Stack
///
/// Entries are hashes under `{prefix}entry:` with a per-key `PEXPIRE`. The
/// scope is indexed as a TAG holding the scope digest, so KNN only ranks
/// entries of the caller's scope. Returned candidates are re-scored with
/// this crate's metric and selected with the same rules as every other
/// index, including the read-time expiry check.
#[derive(Clone)]
pub struct RedisSimilarityIndex {
    connection: ConnectionManager,
    config: RedisIndexConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RedisSimilarityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSimilarityIndex")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisSimilarityIndex {
    /// Connect and make sure the search index exists with a matching schema
    pub async fn connect(config: RedisIndexConfig) -> Result<Self, DomainError> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        config: RedisIndexConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        if config.dimensions == 0 {
            return Err(DomainError::configuration(
                "Index dimensions must be greater than zero",
            ));
        }

        let client = Client::open(config.url.as_str()).map_err(|e| {
            DomainError::configuration(format!("Invalid Redis URL '{}': {}", config.url, e))
        })?;

        let connection = tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| DomainError::timeout("Timed out connecting to Redis"))?
        .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        let index = Self {
            connection,
            config,
            clock,
        };
        index.ensure_schema().await?;

        Ok(index)
    }

    async fn ensure_schema(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();
        let meta_key = self.config.meta_key();

        let meta: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(&meta_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to read index metadata: {}", e)))?;

        if meta.is_empty() {
            let _: () = redis::cmd("HSET")
                .arg(&meta_key)
                .arg("dimensions")
                .arg(self.config.dimensions)
                .arg("metric")
                .arg(self.config.metric.to_string())
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    DomainError::cache(format!("Failed to write index metadata: {}", e))
                })?;
        } else {
            check_schema(&meta, self.config.dimensions, self.config.metric)?;
        }

        let created: redis::RedisResult<()> = redis::cmd("FT.CREATE")
            .arg(&self.config.name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(self.config.entry_prefix())
            .arg("SCHEMA")
            .arg(FIELD_SCOPE_TAG)
            .arg("TAG")
            .arg(FIELD_EXPIRES_AT)
            .arg("NUMERIC")
            .arg(FIELD_VECTOR)
            .arg("VECTOR")
            .arg("FLAT")
            .arg(6)
            .arg("TYPE")
            .arg("FLOAT32")
            .arg("DIM")
            .arg(self.config.dimensions)
            .arg("DISTANCE_METRIC")
            .arg(self.config.metric.redis_name())
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                info!(
                    index = %self.config.name,
                    dimensions = self.config.dimensions,
                    metric = %self.config.metric,
                    "Created Redis search index"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("Index already exists") => Ok(()),
            Err(e) => Err(DomainError::cache(format!(
                "Failed to create search index '{}': {}",
                self.config.name, e
            ))),
        }
    }

    /// KNN over live entries of one scope
    async fn search(
        &self,
        vector: &[f32],
        scope: &CacheScope,
        k: usize,
        now: u64,
    ) -> Result<Vec<HashMap<String, Vec<u8>>>, DomainError> {
        let mut conn = self.connection.clone();
        let query = format!(
            "(@{}:{{{}}} @{}:[({} +inf])=>[KNN {} @{} $vec AS vector_distance]",
            FIELD_SCOPE_TAG,
            scope.digest(),
            FIELD_EXPIRES_AT,
            now,
            k,
            FIELD_VECTOR
        );

        let mut cmd = redis::cmd("FT.SEARCH");
        cmd.arg(&self.config.name)
            .arg(query)
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(encode_vector(vector))
            .arg("SORTBY")
            .arg("vector_distance")
            .arg("RETURN")
            .arg(RETURN_FIELDS.len());
        for field in RETURN_FIELDS {
            cmd.arg(*field);
        }
        cmd.arg("LIMIT").arg(0).arg(k).arg("DIALECT").arg(2);

        let reply: Value = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Vector search failed: {}", e)))?;

        parse_search_reply(reply)
    }

    fn entry_key(&self, key: &str) -> String {
        format!("{}{}", self.config.entry_prefix(), key)
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

    async fn scan_entry_keys(&self) -> Result<Vec<String>, DomainError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", self.config.entry_prefix());
        let mut cursor = 0u64;
        let mut found = Vec::new();

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to scan keys: {}", e)))?;

            found.extend(keys);
            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize, DomainError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let mut deleted = 0usize;
        for chunk in keys.chunks(500) {
            let count: usize = redis::cmd("DEL")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to delete keys: {}", e)))?;
            deleted += count;
        }

        Ok(deleted)
    }
}

#[async_trait]
impl SimilarityIndex for RedisSimilarityIndex {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), DomainError> {
        self.check_dimensions(entry.vector().len())?;

        let mut conn = self.connection.clone();
        let sequence: u64 = redis::cmd("INCR")
            .arg(self.config.sequence_key())
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to allocate sequence: {}", e)))?;

        let scope_json = serde_json::to_string(entry.scope())
            .map_err(|e| DomainError::internal(format!("Failed to encode scope: {}", e)))?;
        let payload_json = serde_json::to_string(entry.payload())
            .map_err(|e| DomainError::internal(format!("Failed to encode payload: {}", e)))?;
        let redis_key = self.entry_key(entry.key());
        let ttl_millis = entry.ttl_seconds().saturating_mul(1000).max(1);

        let _: () = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&redis_key)
            .arg(FIELD_KEY)
            .arg(entry.key())
            .arg(FIELD_SCOPE_TAG)
            .arg(entry.scope().digest())
            .arg(FIELD_SCOPE)
            .arg(scope_json)
            .arg(FIELD_VECTOR)
            .arg(encode_vector(entry.vector()))
            .arg(FIELD_DISCRIMINANT)
            .arg(entry.discriminant())
            .arg(FIELD_PAYLOAD)
            .arg(payload_json)
            .arg(FIELD_CREATED_AT)
            .arg(entry.created_at())
            .arg(FIELD_TTL)
            .arg(entry.ttl_seconds())
            .arg(FIELD_SEQUENCE)
            .arg(sequence)
            .arg(FIELD_EXPIRES_AT)
            .arg(entry.expires_at())
            .ignore()
            .cmd("PEXPIRE")
            .arg(&redis_key)
            .arg(ttl_millis)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::cache(format!("Failed to write entry '{}': {}", entry.key(), e))
            })?;

        debug!(key = %entry.key(), sequence, "Wrote entry to Redis index");
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
        let now = self.clock.now_millis();
        let mut k = self.config.candidate_limit;

        loop {
            let docs = self.search(vector, scope, k, now).await?;
            let fetched = docs.len();

            let candidates: Vec<Candidate> = docs
                .into_iter()
                .filter_map(|fields| decode_stored(&fields))
                .filter(|(entry, _)| entry.scope() == scope)
                .filter_map(|(entry, sequence)| {
                    let distance = metric.distance(vector, entry.vector())?;
                    Some(Candidate {
                        entry,
                        distance,
                        sequence,
                    })
                })
                .collect();

            let farthest = candidates
                .iter()
                .map(|c| c.distance)
                .fold(None, |acc: Option<f32>, d| Some(acc.map_or(d, |a| a.max(d))));
            let found = nearest_within(candidates, distance_threshold, now);
            let reach = found.as_ref().map_or(distance_threshold, |m| m.distance);

            debug!(
                scope = %scope.tag(),
                window = k,
                fetched,
                "Searched Redis index"
            );

            if k >= MAX_CANDIDATES || !window_may_hide_better(fetched, k, farthest, reach) {
                return Ok(found);
            }
            k = (k * 2).min(MAX_CANDIDATES);
        }
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let keys = self.scan_entry_keys().await?;
        let deleted = self.delete_keys(&keys).await?;
        info!(index = %self.config.name, deleted, "Cleared Redis index");
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        Ok(self.scan_entry_keys().await?.len())
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        let keys = self.scan_entry_keys().await?;
        let now = self.clock.now_millis();
        let mut conn = self.connection.clone();
        let mut expired = Vec::new();

        for key in keys {
            let (created_at, ttl): (Option<u64>, Option<u64>) = redis::cmd("HMGET")
                .arg(&key)
                .arg(FIELD_CREATED_AT)
                .arg(FIELD_TTL)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to read '{}': {}", key, e)))?;

            if let (Some(created_at), Some(ttl)) = (created_at, ttl) {
                if now >= created_at.saturating_add(ttl.saturating_mul(1000)) {
                    expired.push(key);
                }
            }
        }

        self.delete_keys(&expired).await
    }
}

fn check_schema(
    meta: &HashMap<String, String>,
    dimensions: usize,
    metric: DistanceMetric,
) -> Result<(), DomainError> {
    let stored_dims: Option<usize> = meta.get("dimensions").and_then(|d| d.parse().ok());
    let stored_metric: Option<DistanceMetric> = meta.get("metric").and_then(|m| m.parse().ok());

    if stored_dims != Some(dimensions) || stored_metric != Some(metric) {
        return Err(DomainError::configuration(format!(
            "Index was created with dimensions={} metric={}, configured dimensions={} metric={}",
            meta.get("dimensions").map(String::as_str).unwrap_or("?"),
            meta.get("metric").map(String::as_str).unwrap_or("?"),
            dimensions,
            metric
        )));
    }

    Ok(())
}

/// Whether a full KNN window could have cut off the entry that should win
///
/// True when the window came back full and its farthest usable candidate
/// is still within reach of the current answer (a tie, or nothing usable
/// at all), so a wider window may hold a newer or unfiltered entry.
fn window_may_hide_better(fetched: usize, k: usize, farthest: Option<f32>, reach: f32) -> bool {
    if fetched < k {
        return false;
    }
    match farthest {
        Some(distance) => distance <= reach,
        None => true,
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn value_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::BulkString(bytes) => Some(bytes.clone()),
        Value::SimpleString(s) => Some(s.as_bytes().to_vec()),
        Value::Int(i) => Some(i.to_string().into_bytes()),
        _ => None,
    }
}

/// Split an `FT.SEARCH` reply into per-document field maps
fn parse_search_reply(reply: Value) -> Result<Vec<HashMap<String, Vec<u8>>>, DomainError> {
    let items: Vec<Value> = redis::from_redis_value(&reply)
        .map_err(|e| DomainError::cache(format!("Unexpected search reply: {}", e)))?;

    // [total, doc_id, [field, value, ...], doc_id, [...], ...]
    let docs = items
        .into_iter()
        .skip(2)
        .step_by(2)
        .map(|fields| {
            let pairs: Vec<Value> = match fields {
                Value::Array(values) => values,
                Value::Map(entries) => entries.into_iter().flat_map(|(k, v)| [k, v]).collect(),
                _ => Vec::new(),
            };
            pairs
                .chunks_exact(2)
                .filter_map(|pair| {
                    let name = String::from_utf8(value_bytes(&pair[0])?).ok()?;
                    Some((name, value_bytes(&pair[1])?))
                })
                .collect()
        })
        .collect();

    Ok(docs)
}

fn decode_stored(fields: &HashMap<String, Vec<u8>>) -> Option<(CacheEntry, u64)> {
    let text = |name: &str| -> Option<String> { String::from_utf8(fields.get(name)?.clone()).ok() };
    let number = |name: &str| -> Option<u64> { text(name)?.parse().ok() };

    let scope: CacheScope = serde_json::from_str(&text(FIELD_SCOPE)?).ok()?;
    let payload = serde_json::from_str(&text(FIELD_PAYLOAD)?).ok()?;
    let entry = CacheEntry::from_parts(
        text(FIELD_KEY)?,
        decode_vector(fields.get(FIELD_VECTOR)?)?,
        text(FIELD_DISCRIMINANT)?,
        payload,
        scope,
        number(FIELD_CREATED_AT)?,
        number(FIELD_TTL)?,
    );

    Some((entry, number(FIELD_SEQUENCE).unwrap_or(0)))
}
