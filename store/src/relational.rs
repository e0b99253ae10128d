use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instrument::{Position, Symbol};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Candle period, mirroring the `kline_minute`/`kline_daily` table split.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Period {
    M1,
    M5,
    M15,
    M30,
    M60,
    D1,
}

/// Immutable once closed, per the data model.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub symbol: Symbol,
    pub period: Period,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub turnover: Decimal,
}

/// A persisted order row, append-only once terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub broker_order_id: String,
    pub symbol: Symbol,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single fill event against an order.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRow {
    pub broker_order_id: String,
    pub symbol: Symbol,
    pub quantity: u64,
    pub price: Decimal,
    pub filled_at: DateTime<Utc>,
}

/// Durable store for K-lines, orders, fills and positions.
///
/// Relational in name only: this crate ships an in-memory implementation suitable for
/// tests and dry-run mode behind the same trait a SQL-backed store would implement.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn insert_candles(&self, candles: Vec<Candle>) -> Result<(), StoreError>;
    async fn candles(&self, symbol: &Symbol, period: Period, limit: usize) -> Result<Vec<Candle>, StoreError>;

    async fn insert_order(&self, order: OrderRow) -> Result<(), StoreError>;
    async fn update_order_status(
        &self,
        broker_order_id: &str,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_fill(&self, fill: FillRow) -> Result<(), StoreError>;

    async fn upsert_position(&self, position: Position) -> Result<(), StoreError>;
    async fn position(&self, symbol: &Symbol) -> Result<Option<Position>, StoreError>;
    async fn all_positions(&self) -> Result<Vec<Position>, StoreError>;
    async fn remove_position(&self, symbol: &Symbol) -> Result<(), StoreError>;
}

/// In-memory [`PersistenceStore`], used for tests and dry-run mode.
#[derive(Default)]
pub struct InMemoryPersistenceStore {
    candles: Mutex<HashMap<(Symbol, Period), Vec<Candle>>>,
    orders: Mutex<HashMap<String, OrderRow>>,
    fills: Mutex<Vec<FillRow>>,
    positions: Mutex<HashMap<Symbol, Position>>,
}

impl InMemoryPersistenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryPersistenceStore {
    async fn insert_candles(&self, candles: Vec<Candle>) -> Result<(), StoreError> {
        let mut store = self.candles.lock();
        for candle in candles {
            store
                .entry((candle.symbol.clone(), candle.period))
                .or_default()
                .push(candle);
        }
        Ok(())
    }

    async fn candles(
        &self,
        symbol: &Symbol,
        period: Period,
        limit: usize,
    ) -> Result<Vec<Candle>, StoreError> {
        Ok(self
            .candles
            .lock()
            .get(&(symbol.clone(), period))
            .map(|series| {
                let start = series.len().saturating_sub(limit);
                series[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn insert_order(&self, order: OrderRow) -> Result<(), StoreError> {
        self.orders.lock().insert(order.broker_order_id.clone(), order);
        Ok(())
    }

    async fn update_order_status(
        &self,
        broker_order_id: &str,
        status: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(order) = self.orders.lock().get_mut(broker_order_id) {
            order.status = status.to_string();
            order.updated_at = updated_at;
        }
        Ok(())
    }

    async fn insert_fill(&self, fill: FillRow) -> Result<(), StoreError> {
        self.fills.lock().push(fill);
        Ok(())
    }

    async fn upsert_position(&self, position: Position) -> Result<(), StoreError> {
        self.positions.lock().insert(position.symbol.clone(), position);
        Ok(())
    }

    async fn position(&self, symbol: &Symbol) -> Result<Option<Position>, StoreError> {
        Ok(self.positions.lock().get(symbol).cloned())
    }

    async fn all_positions(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self.positions.lock().values().cloned().collect())
    }

    async fn remove_position(&self, symbol: &Symbol) -> Result<(), StoreError> {
        self.positions.lock().remove(symbol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instrument::Market;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, qty: u64) -> Position {
        Position::new(
            Symbol::new(symbol),
            qty,
            qty,
            dec!(100),
            "USD".into(),
            Market::Us,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_upsert_and_fetch_position() {
        let store = InMemoryPersistenceStore::new();
        store.upsert_position(position("AAPL.US", 100)).await.unwrap();
        let fetched = store.position(&Symbol::new("AAPL.US")).await.unwrap();
        assert_eq!(fetched.unwrap().quantity, 100);
    }

    #[tokio::test]
    async fn test_remove_position() {
        let store = InMemoryPersistenceStore::new();
        store.upsert_position(position("AAPL.US", 100)).await.unwrap();
        store.remove_position(&Symbol::new("AAPL.US")).await.unwrap();
        assert!(store.position(&Symbol::new("AAPL.US")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_candles_limit() {
        let store = InMemoryPersistenceStore::new();
        let symbol = Symbol::new("AAPL.US");
        let candles: Vec<_> = (0..5)
            .map(|i| Candle {
                symbol: symbol.clone(),
                period: Period::D1,
                timestamp: Utc::now(),
                open: dec!(1),
                high: dec!(1),
                low: dec!(1),
                close: Decimal::from(i),
                volume: 0,
                turnover: dec!(0),
            })
            .collect();
        store.insert_candles(candles).await.unwrap();
        let recent = store.candles(&symbol, Period::D1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.last().unwrap().close, dec!(4));
    }
}
