use chrono::{DateTime, Utc};
use instrument::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

/// A trading intent (a.k.a. signal): a strategy or the risk controller's candidate order,
/// not yet validated or priced.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradingIntent {
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity_shares: u64,
    pub reference_price: Decimal,
    /// Stop-loss level implied by the strategy, consulted by the signal-implied-risk check.
    pub stop_loss: Option<Decimal>,
    /// Quality score in `[0, 100]`, from the strategy. Independent of `urgency`.
    pub score: f64,
    pub strategy_name: String,
    /// Execution-style hint in `[1, 10]`. Independent of `score`.
    pub urgency: u8,
    pub max_slippage: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub queued_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    /// Wall-clock nanosecond fraction baked in at first publish, preserved verbatim across
    /// retries so re-sorts under equal score stay stable (see design note on jitter).
    pub monotonic_counter: u64,
}

impl TradingIntent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        side: Side,
        quantity_shares: u64,
        reference_price: Decimal,
        score: f64,
        strategy_name: impl Into<String>,
        urgency: u8,
        max_slippage: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol,
            side,
            quantity_shares,
            reference_price,
            stop_loss: None,
            score,
            strategy_name: strategy_name.into(),
            urgency,
            max_slippage,
            reason: reason.into(),
            created_at: now,
            retry_count: 0,
            queued_at: now,
            last_error: None,
            processing_started_at: None,
            monotonic_counter: now.timestamp_subsec_nanos() as u64,
        }
    }

    pub fn with_stop_loss(mut self, stop_loss: Decimal) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }
}
