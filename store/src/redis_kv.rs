use crate::{
    error::StoreError,
    kv::{KeyValueStore, ScoredEntry},
};
use async_trait::async_trait;

/// Redis-backed [`KeyValueStore`], used in production.
///
/// Follows the teacher's `RedisClientStore` shape (a thin wrapper around [`redis::Client`]
/// opening a fresh connection per call) but models ZSET/HASH commands instead of a flat
/// snapshot/delta/trade key layout.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    client: redis::Client,
}

impl RedisKeyValueStore {
    pub fn new(url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn zadd(
        &self,
        collection: &str,
        member: &str,
        score: f64,
        payload: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(collection)
            .arg(score)
            .arg(member)
            .cmd("HSET")
            .arg(format!("{collection}:payload"))
            .arg(member)
            .arg(payload)
            .query::<()>(&mut conn)?;
        Ok(())
    }

    async fn zrem(&self, collection: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.client.get_connection()?;
        let removed: i64 = redis::cmd("ZREM")
            .arg(collection)
            .arg(member)
            .query(&mut conn)?;
        redis::cmd("HDEL")
            .arg(format!("{collection}:payload"))
            .arg(member)
            .query::<i64>(&mut conn)?;
        Ok(removed > 0)
    }

    async fn zpopmin(&self, collection: &str) -> Result<Option<ScoredEntry>, StoreError> {
        let mut conn = self.client.get_connection()?;
        let popped: Vec<String> = redis::cmd("ZPOPMIN")
            .arg(collection)
            .arg(1)
            .query(&mut conn)?;
        let [member, score_str] = popped.as_slice() else {
            return Ok(None);
        };
        let payload: Option<String> = redis::cmd("HGET")
            .arg(format!("{collection}:payload"))
            .arg(member)
            .query(&mut conn)?;
        redis::cmd("HDEL")
            .arg(format!("{collection}:payload"))
            .arg(member)
            .query::<i64>(&mut conn)?;
        Ok(Some(ScoredEntry {
            member: member.clone(),
            score: score_str.parse().unwrap_or_default(),
            payload: payload.unwrap_or_default(),
        }))
    }

    async fn zrange_all(&self, collection: &str) -> Result<Vec<ScoredEntry>, StoreError> {
        let mut conn = self.client.get_connection()?;
        let members_scores: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(collection)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query(&mut conn)?;
        let mut out = Vec::with_capacity(members_scores.len());
        for (member, score) in members_scores {
            let payload: Option<String> = redis::cmd("HGET")
                .arg(format!("{collection}:payload"))
                .arg(&member)
                .query(&mut conn)?;
            out.push(ScoredEntry {
                member,
                score,
                payload: payload.unwrap_or_default(),
            });
        }
        Ok(out)
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
        let mut conn = self.client.get_connection()?;
        Ok(redis::cmd("ZCARD").arg(collection).query(&mut conn)?)
    }

    async fn zclear(&self, collection: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(collection)
            .cmd("DEL")
            .arg(format!("{collection}:payload"))
            .query::<()>(&mut conn)?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_connection()?;
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query::<i64>(&mut conn)?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut conn = self.client.get_connection()?;
        let fields: Vec<(String, String)> = redis::cmd("HGETALL").arg(key).query(&mut conn)?;
        Ok(fields)
    }
}
