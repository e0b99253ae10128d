use crate::error::QuoteError;
use crate::gateway::{Adjust, QuoteGateway, SubType};
use crate::snapshot::{Depth, QuoteEvent, QuoteSnapshot};
use async_trait::async_trait;
use instrument::{Symbol, SymbolMeta};
use parking_lot::Mutex;
use std::collections::HashMap;
use store::{Candle, Period};
use tokio::sync::broadcast;

/// In-memory [`QuoteGateway`] for tests and dry-run mode, grounded in the in-memory/Redis
/// store-pair pattern used for persistence elsewhere in this engine.
pub struct SimulatedQuoteGateway {
    quotes: Mutex<HashMap<Symbol, QuoteSnapshot>>,
    depths: Mutex<HashMap<Symbol, Depth>>,
    candles: Mutex<HashMap<(Symbol, Period), Vec<Candle>>>,
    statics: Mutex<HashMap<Symbol, SymbolMeta>>,
    sender: broadcast::Sender<QuoteEvent>,
}

impl SimulatedQuoteGateway {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            quotes: Mutex::new(HashMap::new()),
            depths: Mutex::new(HashMap::new()),
            candles: Mutex::new(HashMap::new()),
            statics: Mutex::new(HashMap::new()),
            sender,
        }
    }

    pub fn push_quote(&self, quote: QuoteSnapshot) {
        self.quotes.lock().insert(quote.symbol.clone(), quote.clone());
        let _ = self.sender.send(QuoteEvent::Quote(quote));
    }

    pub fn push_depth(&self, symbol: Symbol, depth: Depth) {
        self.depths.lock().insert(symbol.clone(), depth);
        let _ = self.sender.send(QuoteEvent::Depth { symbol, depth });
    }

    pub fn seed_candles(&self, symbol: Symbol, period: Period, candles: Vec<Candle>) {
        self.candles.lock().insert((symbol, period), candles);
    }

    pub fn seed_static(&self, meta: SymbolMeta) {
        self.statics.lock().insert(meta.symbol.clone(), meta);
    }
}

impl Default for SimulatedQuoteGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteGateway for SimulatedQuoteGateway {
    async fn get_realtime_quote(&self, symbols: &[Symbol]) -> Result<Vec<QuoteSnapshot>, QuoteError> {
        let quotes = self.quotes.lock();
        symbols
            .iter()
            .map(|symbol| quotes.get(symbol).cloned().ok_or_else(|| QuoteError::UnknownSymbol(symbol.clone())))
            .collect()
    }

    async fn get_history_candles(
        &self,
        symbol: &Symbol,
        period: Period,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Candle>, QuoteError> {
        Ok(self
            .candles
            .lock()
            .get(&(symbol.clone(), period))
            .map(|series| {
                series
                    .iter()
                    .filter(|candle| candle.timestamp >= start && candle.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_candlesticks(
        &self,
        symbol: &Symbol,
        period: Period,
        count: usize,
        _adjust: Adjust,
    ) -> Result<Vec<Candle>, QuoteError> {
        Ok(self
            .candles
            .lock()
            .get(&(symbol.clone(), period))
            .map(|series| {
                let start = series.len().saturating_sub(count);
                series[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn get_static_info(&self, symbols: &[Symbol]) -> Result<Vec<SymbolMeta>, QuoteError> {
        let statics = self.statics.lock();
        symbols
            .iter()
            .map(|symbol| statics.get(symbol).cloned().ok_or_else(|| QuoteError::UnknownSymbol(symbol.clone())))
            .collect()
    }

    async fn get_depth(&self, symbol: &Symbol) -> Result<Depth, QuoteError> {
        self.depths.lock().get(symbol).copied().ok_or_else(|| QuoteError::UnknownSymbol(symbol.clone()))
    }

    async fn subscribe(
        &self,
        _symbols: &[Symbol],
        _sub_types: &[SubType],
        first_push: bool,
    ) -> Result<broadcast::Receiver<QuoteEvent>, QuoteError> {
        let receiver = self.sender.subscribe();
        if first_push {
            let quotes: Vec<_> = self.quotes.lock().values().cloned().collect();
            for quote in quotes {
                let _ = self.sender.send(QuoteEvent::Quote(quote));
            }
        }
        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str) -> QuoteSnapshot {
        QuoteSnapshot::new(
            Symbol::new(symbol),
            dec!(10),
            dec!(9.5),
            dec!(9.8),
            dec!(10.2),
            dec!(9.7),
            1000,
            dec!(10000),
            dec!(9.99),
            dec!(10.01),
            100,
            100,
            crate::snapshot::TradeStatus::Normal,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_get_realtime_quote_unknown_symbol_errors() {
        let gateway = SimulatedQuoteGateway::new();
        let result = gateway.get_realtime_quote(&[Symbol::new("AAPL.US")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_push_then_fetch_quote() {
        let gateway = SimulatedQuoteGateway::new();
        gateway.push_quote(quote("AAPL.US"));
        let quotes = gateway.get_realtime_quote(&[Symbol::new("AAPL.US")]).await.unwrap();
        assert_eq!(quotes[0].last, dec!(10));
    }

    #[tokio::test]
    async fn test_subscribe_receives_pushed_quote() {
        let gateway = SimulatedQuoteGateway::new();
        let mut receiver = gateway.subscribe(&[Symbol::new("AAPL.US")], &[SubType::Quote], false).await.unwrap();
        gateway.push_quote(quote("AAPL.US"));
        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, QuoteEvent::Quote(_)));
    }
}
