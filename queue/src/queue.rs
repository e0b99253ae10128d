use crate::{
    error::QueueError,
    intent::{Side, TradingIntent},
};
use chrono::Utc;
use instrument::Symbol;
use std::sync::Arc;
use store::KeyValueStore;

const ZOMBIE_TIMEOUT_SECS: i64 = 300;
const RETRY_PENALTY_PER_ATTEMPT: f64 = 10.0;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Collection {
    Pending,
    Processing,
    Failed,
}

/// Size of each observable collection, per `stats()`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
}

/// Durable, priority-ordered, at-least-once work queue of [`TradingIntent`]s.
///
/// Backed by a [`KeyValueStore`] holding three sorted collections keyed by account:
/// `trading:<account>:signals` (pending), `trading:<account>:signals:processing`, and
/// `trading:<account>:signals:failed`. Every mutation goes through this type so the
/// invariants in the component design (exactly-one-collection membership, zombie-safe
/// recovery order) hold regardless of backend.
pub struct SignalQueue {
    store: Arc<dyn KeyValueStore>,
    account: String,
    max_retries: u32,
}

impl SignalQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, account: impl Into<String>, max_retries: u32) -> Self {
        Self {
            store,
            account: account.into(),
            max_retries,
        }
    }

    fn key(&self, collection: Collection) -> String {
        match collection {
            Collection::Pending => format!("trading:{}:signals", self.account),
            Collection::Processing => format!("trading:{}:signals:processing", self.account),
            Collection::Failed => format!("trading:{}:signals:failed", self.account),
        }
    }

    /// `-score + nanosecond_fraction` so the highest score pops first and equal scores break
    /// ties by insertion order (the fraction is `monotonic_counter` baked into the intent at
    /// first publish and preserved across retries).
    fn priority_of(intent: &TradingIntent) -> f64 {
        let effective_score = intent.score - RETRY_PENALTY_PER_ATTEMPT * intent.retry_count as f64;
        let fraction = intent.monotonic_counter as f64 / 1_000_000_000.0;
        -effective_score + fraction
    }

    /// Atomic insert into pending. Returns `false` on store error (surfaced to the caller,
    /// which decides whether to retry).
    pub async fn publish(&self, intent: &TradingIntent) -> bool {
        match self.publish_inner(intent).await {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(%error, intent_id = %intent.id, "failed to publish intent");
                false
            }
        }
    }

    async fn publish_inner(&self, intent: &TradingIntent) -> Result<(), QueueError> {
        let payload = serde_json::to_string(intent)?;
        let priority = Self::priority_of(intent);
        self.store
            .zadd(&self.key(Collection::Pending), &intent.id, priority, &payload)
            .await?;
        tracing::info!(intent_id = %intent.id, symbol = %intent.symbol, score = intent.score, "published intent");
        Ok(())
    }

    /// Recover zombies, then atomically pop the highest-priority pending intent into
    /// processing.
    pub async fn consume(&self) -> Option<TradingIntent> {
        if let Err(error) = self.recover_zombies(ZOMBIE_TIMEOUT_SECS).await {
            tracing::warn!(%error, "zombie recovery failed during consume, continuing");
        }

        match self.consume_inner().await {
            Ok(intent) => intent,
            Err(error) => {
                tracing::warn!(%error, "consume failed, treating as nothing to do");
                None
            }
        }
    }

    async fn consume_inner(&self) -> Result<Option<TradingIntent>, QueueError> {
        let Some(popped) = self.store.zpopmin(&self.key(Collection::Pending)).await? else {
            return Ok(None);
        };

        let mut intent: TradingIntent = serde_json::from_str(&popped.payload)?;
        intent.processing_started_at = Some(Utc::now());

        let payload = serde_json::to_string(&intent)?;
        let processing_score = Utc::now().timestamp() as f64;
        self.store
            .zadd(&self.key(Collection::Processing), &intent.id, processing_score, &payload)
            .await?;

        tracing::info!(intent_id = %intent.id, symbol = %intent.symbol, "consumed intent");
        Ok(Some(intent))
    }

    /// Remove `intent` from processing using its id.
    pub async fn mark_completed(&self, intent: &TradingIntent) -> bool {
        match self.store.zrem(&self.key(Collection::Processing), &intent.id).await {
            Ok(removed) => removed,
            Err(error) => {
                tracing::error!(%error, intent_id = %intent.id, "failed to mark intent completed");
                false
            }
        }
    }

    /// Remove from processing; republish with degraded priority if under the retry budget,
    /// otherwise move to failed.
    pub async fn mark_failed(&self, mut intent: TradingIntent, error_reason: impl Into<String>) -> bool {
        let error_reason = error_reason.into();
        intent.last_error = Some(error_reason.clone());

        let should_retry = intent.retry_count + 1 < self.max_retries;

        let result = if should_retry {
            intent.retry_count += 1;
            self.publish_inner(&intent).await
        } else {
            self.fail_inner(&intent, &error_reason).await
        };

        match result {
            Ok(()) => {
                let _ = self.store.zrem(&self.key(Collection::Processing), &intent.id).await;
                true
            }
            Err(error) => {
                tracing::error!(%error, intent_id = %intent.id, "failed to mark intent failed");
                false
            }
        }
    }

    async fn fail_inner(&self, intent: &TradingIntent, reason: &str) -> Result<(), QueueError> {
        let mut failed_intent = intent.clone();
        failed_intent.last_error = Some(reason.to_string());
        let payload = serde_json::to_string(&failed_intent)?;
        let score = Utc::now().timestamp() as f64;
        self.store
            .zadd(&self.key(Collection::Failed), &intent.id, score, &payload)
            .await?;
        tracing::warn!(intent_id = %intent.id, reason, "intent exhausted retries, moved to failed");
        Ok(())
    }

    /// Republish processing entries older than `timeout_secs`, in insertion order, before
    /// removing them from processing (never the reverse — see the invariant on zombie
    /// recovery never losing an item).
    pub async fn recover_zombies(&self, timeout_secs: i64) -> Result<u64, QueueError> {
        let cutoff = (Utc::now().timestamp() - timeout_secs) as f64;
        let stale = self
            .store
            .zrange_by_score_lt(&self.key(Collection::Processing), cutoff)
            .await?;

        let mut recovered = 0;
        for entry in stale {
            let intent: TradingIntent = serde_json::from_str(&entry.payload)?;
            self.publish_inner(&intent).await?;
            self.store.zrem(&self.key(Collection::Processing), &entry.member).await?;
            tracing::warn!(intent_id = %intent.id, symbol = %intent.symbol, "recovered zombie intent");
            recovered += 1;
        }
        Ok(recovered)
    }

    /// Scan pending and processing for an existing intent on `(symbol, side)`.
    pub async fn has_pending(&self, symbol: &Symbol, side: Option<Side>) -> bool {
        self.has_pending_inner(symbol, side).await.unwrap_or(false)
    }

    async fn has_pending_inner(&self, symbol: &Symbol, side: Option<Side>) -> Result<bool, QueueError> {
        for collection in [Collection::Pending, Collection::Processing] {
            let entries = self.store.zrange_all(&self.key(collection)).await?;
            for entry in entries {
                let intent: TradingIntent = serde_json::from_str(&entry.payload)?;
                if &intent.symbol == symbol && side.is_none_or(|side| side == intent.side) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub async fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.store.zcard(&self.key(Collection::Pending)).await.unwrap_or(0),
            processing: self.store.zcard(&self.key(Collection::Processing)).await.unwrap_or(0),
            failed: self.store.zcard(&self.key(Collection::Failed)).await.unwrap_or(0),
        }
    }

    pub async fn clear(&self, collection: Collection) -> Result<(), QueueError> {
        self.store.zclear(&self.key(collection)).await?;
        Ok(())
    }

    /// All symbols with at least one pending intent, for diagnostics and rebalancer gating.
    pub async fn pending_symbols(&self) -> Vec<Symbol> {
        let Ok(entries) = self.store.zrange_all(&self.key(Collection::Pending)).await else {
            return Vec::new();
        };
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_str::<TradingIntent>(&entry.payload).ok())
            .map(|intent| intent.symbol)
            .collect()
    }

    /// Count of pending BUY intents scoring at least `min_score`, for the capital allocator's
    /// shortage assessment.
    pub async fn pending_high_score_buy_count(&self, min_score: f64) -> usize {
        let Ok(entries) = self.store.zrange_all(&self.key(Collection::Pending)).await else {
            return 0;
        };
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_str::<TradingIntent>(&entry.payload).ok())
            .filter(|intent| intent.side == Side::Buy && intent.score >= min_score)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use store::InMemoryKeyValueStore;

    fn queue() -> SignalQueue {
        SignalQueue::new(Arc::new(InMemoryKeyValueStore::new()), "acct1", 3)
    }

    fn intent(symbol: &str, score: f64) -> TradingIntent {
        TradingIntent::new(
            Symbol::new(symbol),
            Side::Buy,
            100,
            dec!(10.00),
            score,
            "test_strategy",
            5,
            dec!(0.01),
            "test",
        )
    }

    #[tokio::test]
    async fn test_publish_then_consume_round_trips() {
        let queue = queue();
        let i = intent("AAPL.US", 80.0);
        assert!(queue.publish(&i).await);
        let consumed = queue.consume().await.unwrap();
        assert_eq!(consumed.id, i.id);
        assert_eq!(consumed.symbol, i.symbol);
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let queue = queue();
        // insertion order 60 -> 70 -> 85, consumption order must be 85, 70, 60.
        let low = intent("A.US", 60.0);
        let mid = intent("B.US", 70.0);
        let high = intent("C.US", 85.0);
        queue.publish(&low).await;
        queue.publish(&mid).await;
        queue.publish(&high).await;

        assert_eq!(queue.consume().await.unwrap().score, 85.0);
        assert_eq!(queue.consume().await.unwrap().score, 70.0);
        assert_eq!(queue.consume().await.unwrap().score, 60.0);
    }

    #[tokio::test]
    async fn test_mark_completed_removes_from_processing() {
        let queue = queue();
        let i = intent("AAPL.US", 80.0);
        queue.publish(&i).await;
        let consumed = queue.consume().await.unwrap();
        let before = queue.stats().await;
        assert_eq!(before.processing, 1);
        assert!(queue.mark_completed(&consumed).await);
        let after = queue.stats().await;
        assert_eq!(after.processing, 0);
    }

    #[tokio::test]
    async fn test_mark_failed_retries_then_gives_up() {
        let queue = queue();
        let i = intent("AAPL.US", 80.0);
        queue.publish(&i).await;

        // 3 consecutive failures with max_retries=3 should exhaust the budget.
        for _ in 0..3 {
            let consumed = queue.consume().await.unwrap();
            queue.mark_failed(consumed, "broker rejected").await;
        }

        let stats = queue.stats().await;
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_has_pending_dedup() {
        let queue = queue();
        let i = intent("AAPL.US", 80.0);
        queue.publish(&i).await;
        assert!(queue.has_pending(&Symbol::new("AAPL.US"), Some(Side::Buy)).await);
        assert!(!queue.has_pending(&Symbol::new("AAPL.US"), Some(Side::Sell)).await);
        assert!(!queue.has_pending(&Symbol::new("MSFT.US"), None).await);
    }

    #[tokio::test]
    async fn test_recover_zombies_republishes_stale_processing_items() {
        let queue = queue();
        let i = intent("AAPL.US", 80.0);
        queue.publish(&i).await;
        let consumed = queue.consume().await.unwrap();

        // Force the processing entry to look 7 minutes old.
        let store = Arc::new(InMemoryKeyValueStore::new());
        let stale_queue = SignalQueue::new(store.clone(), "acct2", 3);
        let payload = serde_json::to_string(&consumed).unwrap();
        let old_score = (Utc::now().timestamp() - 7 * 60) as f64;
        store
            .zadd("trading:acct2:signals:processing", &consumed.id, old_score, &payload)
            .await
            .unwrap();

        let recovered = stale_queue.recover_zombies(300).await.unwrap();
        assert_eq!(recovered, 1);
        let stats = stale_queue.stats().await;
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 0);
    }

    #[tokio::test]
    async fn test_recover_zombies_idempotent() {
        let queue = queue();
        let i = intent("AAPL.US", 80.0);
        queue.publish(&i).await;
        queue.consume().await.unwrap();

        let store = queue.store.clone();
        let account = queue.account.clone();
        let key = format!("trading:{account}:signals:processing");
        let entries = store.zrange_all(&key).await.unwrap();
        let member = entries[0].member.clone();
        let old_score = (Utc::now().timestamp() - 7 * 60) as f64;
        store.zadd(&key, &member, old_score, &entries[0].payload).await.unwrap();

        let first = queue.recover_zombies(300).await.unwrap();
        let second = queue.recover_zombies(300).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }
}
