use chrono::{DateTime, Utc};
use derive_more::Constructor;
use instrument::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Realtime quote snapshot, monetary fields arbitrary-precision.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct QuoteSnapshot {
    pub symbol: Symbol,
    pub last: Decimal,
    pub prev_close: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
    pub turnover: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_size: u64,
    pub ask_size: u64,
    pub trade_status: TradeStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub enum TradeStatus {
    Normal,
    Halted,
    Delisted,
}

/// Top-of-book depth snapshot used by the router's dynamic limit pricing.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Depth {
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_size: u64,
    pub ask_size: u64,
}

/// Push events fanned out to strategy subscribers, mirroring `set_on_quote`/`set_on_depth`/
/// `set_on_trades` callbacks from a single broadcast channel instead of raw thread callbacks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum QuoteEvent {
    Quote(QuoteSnapshot),
    Depth { symbol: Symbol, depth: Depth },
    Trade { symbol: Symbol, price: Decimal, quantity: u64, timestamp: DateTime<Utc> },
}
