use crate::error::StoreError;
use async_trait::async_trait;

/// One entry of a sorted collection: a unique member id, its ordering score, and its opaque
/// JSON payload (the `_original_payload` the signal queue republishes verbatim).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub member: String,
    pub score: f64,
    pub payload: String,
}

/// Minimal key-value abstraction the engine needs: Redis-ZSET-shaped sorted collections plus
/// flat hashes, matching the layout in `trading:signals`/`trading:signals:processing`/
/// `trading:signals:failed` and `trading:positions:<symbol>`.
///
/// Any store providing these with equivalent atomicity is acceptable; this crate ships an
/// in-memory implementation ([`crate::memory_kv::InMemoryKeyValueStore`]) and a Redis-backed
/// one ([`crate::redis_kv::RedisKeyValueStore`]).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Insert or update `member` in `collection` at `score`, storing `payload` alongside it.
    async fn zadd(
        &self,
        collection: &str,
        member: &str,
        score: f64,
        payload: &str,
    ) -> Result<(), StoreError>;

    /// Remove `member` from `collection`. Returns whether it was present.
    async fn zrem(&self, collection: &str, member: &str) -> Result<bool, StoreError>;

    /// Atomically pop the lowest-scored entry from `collection`.
    async fn zpopmin(&self, collection: &str) -> Result<Option<ScoredEntry>, StoreError>;

    /// All entries in `collection`, unordered.
    async fn zrange_all(&self, collection: &str) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Entries in `collection` whose score is strictly less than `max_score`.
    async fn zrange_by_score_lt(
        &self,
        collection: &str,
        max_score: f64,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    /// Size of `collection`.
    async fn zcard(&self, collection: &str) -> Result<u64, StoreError>;

    /// Remove every entry from `collection`.
    async fn zclear(&self, collection: &str) -> Result<(), StoreError>;

    /// Set a single field in hash `key`.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// All fields of hash `key`.
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError>;
}
