use crate::{
    error::StoreError,
    kv::{KeyValueStore, ScoredEntry},
};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory [`KeyValueStore`], used for tests and dry-run mode.
///
/// Mirrors the teacher's `InMemoryStore` pattern (an `Arc`-free, lock-guarded map keyed by
/// collection name) but models Redis ZSET/HASH semantics instead of a flat key->JSON map.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    sorted: Mutex<HashMap<String, IndexMap<String, (f64, String)>>>,
    hashes: Mutex<HashMap<String, IndexMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn zadd(
        &self,
        collection: &str,
        member: &str,
        score: f64,
        payload: &str,
    ) -> Result<(), StoreError> {
        self.sorted
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(member.to_string(), (score, payload.to_string()));
        Ok(())
    }

    async fn zrem(&self, collection: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .sorted
            .lock()
            .get_mut(collection)
            .map(|set| set.shift_remove(member).is_some())
            .unwrap_or(false))
    }

    async fn zpopmin(&self, collection: &str) -> Result<Option<ScoredEntry>, StoreError> {
        let mut sorted = self.sorted.lock();
        let Some(set) = sorted.get_mut(collection) else {
            return Ok(None);
        };
        let min = set
            .iter()
            .min_by(|a, b| a.1.0.total_cmp(&b.1.0))
            .map(|(member, _)| member.clone());
        let Some(member) = min else {
            return Ok(None);
        };
        let (score, payload) = set.shift_remove(&member).expect("member just located");
        Ok(Some(ScoredEntry {
            member,
            score,
            payload,
        }))
    }

    async fn zrange_all(&self, collection: &str) -> Result<Vec<ScoredEntry>, StoreError> {
        Ok(self
            .sorted
            .lock()
            .get(collection)
            .map(|set| {
                set.iter()
                    .map(|(member, (score, payload))| ScoredEntry {
                        member: member.clone(),
                        score: *score,
                        payload: payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn zrange_by_score_lt(
        &self,
        collection: &str,
        max_score: f64,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        Ok(self
            .zrange_all(collection)
            .await?
            .into_iter()
            .filter(|entry| entry.score < max_score)
            .collect())
    }

    async fn zcard(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self
            .sorted
            .lock()
            .get(collection)
            .map(|set| set.len() as u64)
            .unwrap_or(0))
    }

    async fn zclear(&self, collection: &str) -> Result<(), StoreError> {
        self.sorted.lock().remove(collection);
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.hashes
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .hashes
            .lock()
            .get(key)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(f, v)| (f.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
