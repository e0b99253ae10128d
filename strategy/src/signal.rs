use queue::Side;
use rust_decimal::Decimal;

/// What a [`crate::Strategy`] hands back from [`crate::Strategy::on_event`]: a candidate
/// order, not yet sized to a lot, priced to a tick, or risk-checked.
#[derive(Debug, Clone)]
pub struct StrategySignal {
    pub side: Side,
    /// Quality score in `[0, 100]`, independent of `urgency`.
    pub score: f64,
    /// Execution-style hint in `[1, 10]`, independent of `score`.
    pub urgency: u8,
    pub max_slippage: Decimal,
    pub stop_loss: Option<Decimal>,
    pub reason: String,
}
