use crate::error::QuoteError;
use crate::snapshot::{Depth, QuoteSnapshot};
use async_trait::async_trait;
use instrument::{Symbol, SymbolMeta};
use store::{Candle, Period};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubType {
    Quote,
    Depth,
    Trade,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Adjust {
    None,
    Forward,
    Backward,
}

/// Abstraction over a streaming push channel and a request/response history channel for
/// candlesticks and realtime quotes. Push subscriptions are consumed through
/// [`QuoteGateway::subscribe`]'s returned receiver rather than raw thread callbacks — the
/// same contract expressed in idiomatic async Rust instead of a callback registered on a
/// provider-owned thread.
#[async_trait]
pub trait QuoteGateway: Send + Sync {
    async fn get_realtime_quote(&self, symbols: &[Symbol]) -> Result<Vec<QuoteSnapshot>, QuoteError>;

    async fn get_history_candles(
        &self,
        symbol: &Symbol,
        period: Period,
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Candle>, QuoteError>;

    async fn get_candlesticks(
        &self,
        symbol: &Symbol,
        period: Period,
        count: usize,
        adjust: Adjust,
    ) -> Result<Vec<Candle>, QuoteError>;

    async fn get_static_info(&self, symbols: &[Symbol]) -> Result<Vec<SymbolMeta>, QuoteError>;

    async fn get_depth(&self, symbol: &Symbol) -> Result<Depth, QuoteError>;

    /// Subscribe to push updates; returns a broadcast receiver fed by the gateway's ingest
    /// task. `first_push` requests an immediate synthetic snapshot before live updates.
    async fn subscribe(
        &self,
        symbols: &[Symbol],
        sub_types: &[SubType],
        first_push: bool,
    ) -> Result<tokio::sync::broadcast::Receiver<crate::snapshot::QuoteEvent>, QuoteError>;
}
