use chrono::{DateTime, Utc};
use instrument::Symbol;
use quotes::QuoteSnapshot;
use rust_decimal::Decimal;

/// One polling tick's worth of market data for a single symbol: the live quote plus enough
/// daily history for the indicators a [`crate::Strategy`] wants to run.
#[derive(Debug, Clone)]
pub struct MarketEvent {
    pub symbol: Symbol,
    pub quote: QuoteSnapshot,
    /// Daily closes, oldest first, including today's close/last.
    pub daily_closes: Vec<Decimal>,
    /// Daily lows, oldest first, aligned with `daily_closes`.
    pub daily_lows: Vec<Decimal>,
    pub as_of: DateTime<Utc>,
}
