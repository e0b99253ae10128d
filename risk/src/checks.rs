use instrument::{Market, Symbol};
use queue::{Side, TradingIntent};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Account-level state a [`RiskCheck`] needs to evaluate an intent. Cheap to construct fresh
/// each validation pass from the persistence and exposure layers.
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub equity: Decimal,
    pub available_cash: HashMap<String, Decimal>,
    pub position_quantity: HashMap<Symbol, u64>,
    pub position_notional: HashMap<Symbol, Decimal>,
    pub long_exposure: Decimal,
    pub short_exposure: Decimal,
    pub daily_realised_pnl: Decimal,
    pub portfolio_drawdown: Decimal,
    pub daily_order_count: u32,
    pub daily_trades_per_symbol: HashMap<Symbol, u32>,
    /// Remaining margin financing summed across the broker's reported balances, zero for a
    /// pure cash account.
    pub remaining_margin_financing: Decimal,
}

impl RiskContext {
    pub fn position_quantity(&self, symbol: &Symbol) -> u64 {
        self.position_quantity.get(symbol).copied().unwrap_or(0)
    }

    pub fn is_margin_account(&self) -> bool {
        self.remaining_margin_financing > Decimal::ZERO
    }
}

/// One independently testable pre-trade rule. New checks are added by implementing this
/// trait and registering an instance with [`crate::pretrade::PreTradeValidator`], never by
/// touching the validator's driver loop.
pub trait RiskCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(())` if the intent passes; `Err(reason)` otherwise. The router moves rejected
    /// intents straight to failed, without retry.
    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String>;
}

/// Position-size limit in shares, per symbol.
pub struct PositionSizeLimit {
    pub max_shares: u64,
}

impl RiskCheck for PositionSizeLimit {
    fn name(&self) -> &'static str {
        "position_size_limit"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        if intent.side != Side::Buy {
            return Ok(());
        }
        let projected = ctx.position_quantity(&intent.symbol) + intent.quantity_shares;
        if projected > self.max_shares {
            return Err(format!(
                "position size {projected} exceeds limit {} for {}",
                self.max_shares, intent.symbol
            ));
        }
        Ok(())
    }
}

/// Notional limit in account currency, per symbol.
pub struct NotionalLimit {
    pub max_notional: Decimal,
}

impl RiskCheck for NotionalLimit {
    fn name(&self) -> &'static str {
        "notional_limit"
    }

    fn check(&self, _ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        let notional = intent.reference_price * Decimal::from(intent.quantity_shares);
        if notional > self.max_notional {
            return Err(format!(
                "notional {notional} exceeds limit {} for {}",
                self.max_notional, intent.symbol
            ));
        }
        Ok(())
    }
}

/// Portfolio allocation cap: no single symbol may exceed `max_allocation_pct` of equity.
pub struct AllocationCap {
    pub max_allocation_pct: Decimal,
}

impl RiskCheck for AllocationCap {
    fn name(&self) -> &'static str {
        "allocation_cap"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        if intent.side != Side::Buy || ctx.equity.is_zero() {
            return Ok(());
        }
        let existing = ctx.position_notional.get(&intent.symbol).copied().unwrap_or(Decimal::ZERO);
        let added = intent.reference_price * Decimal::from(intent.quantity_shares);
        let projected_pct = (existing + added) / ctx.equity;
        if projected_pct > self.max_allocation_pct {
            return Err(format!(
                "allocation {:.2}% exceeds cap {:.2}% for {}",
                projected_pct * Decimal::from(100),
                self.max_allocation_pct * Decimal::from(100),
                intent.symbol
            ));
        }
        Ok(())
    }
}

/// Daily order count cap, across all symbols.
pub struct DailyOrderCountCap {
    pub max_orders_per_day: u32,
}

impl RiskCheck for DailyOrderCountCap {
    fn name(&self) -> &'static str {
        "daily_order_count_cap"
    }

    fn check(&self, ctx: &RiskContext, _intent: &TradingIntent) -> Result<(), String> {
        if ctx.daily_order_count >= self.max_orders_per_day {
            return Err(format!("daily order count cap {} reached", self.max_orders_per_day));
        }
        Ok(())
    }
}

/// Per-symbol, per-trading-day trade count cap, reset at the scheduler's market-open
/// transition.
pub struct DailyTradesPerSymbolCap {
    pub max_trades_per_symbol: u32,
}

impl RiskCheck for DailyTradesPerSymbolCap {
    fn name(&self) -> &'static str {
        "daily_trades_per_symbol_cap"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        let count = ctx.daily_trades_per_symbol.get(&intent.symbol).copied().unwrap_or(0);
        if count >= self.max_trades_per_symbol {
            return Err(format!(
                "daily trades cap {} reached for {}",
                self.max_trades_per_symbol, intent.symbol
            ));
        }
        Ok(())
    }
}

/// Daily realised-loss cap: once breached, all new opening (BUY) intents are rejected until
/// the next trading day.
pub struct DailyLossCap {
    pub max_daily_loss_pct: Decimal,
}

impl RiskCheck for DailyLossCap {
    fn name(&self) -> &'static str {
        "daily_loss_cap"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        if intent.side != Side::Buy || ctx.equity.is_zero() {
            return Ok(());
        }
        let loss_pct = ctx.daily_realised_pnl / ctx.equity;
        if loss_pct < -self.max_daily_loss_pct {
            return Err(format!(
                "daily realised loss {:.2}% breaches cap {:.2}%, opening intents locked out",
                loss_pct * Decimal::from(100),
                self.max_daily_loss_pct * Decimal::from(100)
            ));
        }
        Ok(())
    }
}

/// Drawdown cap from peak equity: same lockout semantics as [`DailyLossCap`].
pub struct DrawdownCap {
    pub max_drawdown_pct: Decimal,
}

impl RiskCheck for DrawdownCap {
    fn name(&self) -> &'static str {
        "drawdown_cap"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        if intent.side != Side::Buy {
            return Ok(());
        }
        if ctx.portfolio_drawdown > self.max_drawdown_pct {
            return Err(format!(
                "portfolio drawdown {:.2}% breaches cap {:.2}%, opening intents locked out",
                ctx.portfolio_drawdown * Decimal::from(100),
                self.max_drawdown_pct * Decimal::from(100)
            ));
        }
        Ok(())
    }
}

/// Long/short exposure caps relative to equity.
pub struct ExposureCap {
    pub max_long_pct: Decimal,
    pub max_short_pct: Decimal,
}

impl RiskCheck for ExposureCap {
    fn name(&self) -> &'static str {
        "exposure_cap"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        if ctx.equity.is_zero() {
            return Ok(());
        }
        let added = intent.reference_price * Decimal::from(intent.quantity_shares);
        match intent.side {
            Side::Buy => {
                let projected = (ctx.long_exposure + added) / ctx.equity;
                if projected > self.max_long_pct {
                    return Err(format!(
                        "long exposure {:.2}% would exceed cap {:.2}%",
                        projected * Decimal::from(100),
                        self.max_long_pct * Decimal::from(100)
                    ));
                }
            }
            Side::Sell => {
                let projected = (ctx.short_exposure + added) / ctx.equity;
                if projected > self.max_short_pct {
                    return Err(format!(
                        "short exposure {:.2}% would exceed cap {:.2}%",
                        projected * Decimal::from(100),
                        self.max_short_pct * Decimal::from(100)
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Signal-implied risk: `(price - stop_loss) * qty <= 2% * equity`.
pub struct SignalImpliedRisk {
    pub max_risk_pct: Decimal,
}

impl RiskCheck for SignalImpliedRisk {
    fn name(&self) -> &'static str {
        "signal_implied_risk"
    }

    fn check(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        let Some(stop_loss) = intent.stop_loss else {
            return Ok(());
        };
        if ctx.equity.is_zero() {
            return Ok(());
        }
        let implied_risk = (intent.reference_price - stop_loss).abs() * Decimal::from(intent.quantity_shares);
        let limit = self.max_risk_pct * ctx.equity;
        if implied_risk > limit {
            return Err(format!(
                "signal-implied risk {implied_risk} exceeds {:.2}% of equity ({limit}) for {}",
                self.max_risk_pct * Decimal::from(100),
                intent.symbol
            ));
        }
        Ok(())
    }
}

/// A market-closed guard: intents against a symbol whose market is not open are rejected,
/// since conditions may have changed between being queued and being processed.
pub struct MarketOpenGuard<'a> {
    pub calendar: &'a calendar::Calendar,
    pub now: chrono::DateTime<chrono::Utc>,
}

impl RiskCheck for MarketOpenGuard<'_> {
    fn name(&self) -> &'static str {
        "market_open_guard"
    }

    fn check(&self, _ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        if !self.calendar.is_open(&intent.symbol, self.now) {
            return Err(format!("{} market is not open", intent.symbol));
        }
        Ok(())
    }
}

pub fn currency_bucket(market: Market) -> &'static str {
    market.currency()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn intent(symbol: &str, side: Side, qty: u64, price: Decimal) -> TradingIntent {
        TradingIntent::new(Symbol::new(symbol), side, qty, price, 80.0, "unit_test", 5, dec!(0.01), "test")
    }

    fn ctx() -> RiskContext {
        RiskContext {
            equity: dec!(100_000),
            available_cash: HashMap::new(),
            position_quantity: HashMap::new(),
            position_notional: HashMap::new(),
            long_exposure: Decimal::ZERO,
            short_exposure: Decimal::ZERO,
            daily_realised_pnl: Decimal::ZERO,
            portfolio_drawdown: Decimal::ZERO,
            daily_order_count: 0,
            daily_trades_per_symbol: HashMap::new(),
            remaining_margin_financing: Decimal::ZERO,
        }
    }

    #[test]
    fn test_position_size_limit_rejects_over_max() {
        let check = PositionSizeLimit { max_shares: 100 };
        let result = check.check(&ctx(), &intent("AAPL.US", Side::Buy, 200, dec!(10)));
        assert!(result.is_err());
    }

    #[test]
    fn test_allocation_cap_rejects_over_pct() {
        let check = AllocationCap { max_allocation_pct: dec!(0.20) };
        let result = check.check(&ctx(), &intent("AAPL.US", Side::Buy, 3000, dec!(10)));
        assert!(result.is_err());
    }

    #[test]
    fn test_daily_loss_cap_locks_out_buys_once_breached() {
        let mut context = ctx();
        context.daily_realised_pnl = dec!(-6_000);
        let check = DailyLossCap { max_daily_loss_pct: dec!(0.05) };
        assert!(check.check(&context, &intent("AAPL.US", Side::Buy, 10, dec!(10))).is_err());
        assert!(check.check(&context, &intent("AAPL.US", Side::Sell, 10, dec!(10))).is_ok());
    }

    #[test]
    fn test_signal_implied_risk_rejects_large_stop_distance() {
        let check = SignalImpliedRisk { max_risk_pct: dec!(0.02) };
        let intent = intent("AAPL.US", Side::Buy, 1000, dec!(100)).with_stop_loss(dec!(50));
        assert!(check.check(&ctx(), &intent).is_err());
    }

    #[test]
    fn test_signal_implied_risk_passes_without_stop_loss() {
        let check = SignalImpliedRisk { max_risk_pct: dec!(0.02) };
        let intent = intent("AAPL.US", Side::Buy, 1000, dec!(100));
        assert!(check.check(&ctx(), &intent).is_ok());
    }

    #[test]
    fn test_daily_trades_per_symbol_cap() {
        let mut context = ctx();
        context.daily_trades_per_symbol.insert(Symbol::new("AAPL.US"), 3);
        let check = DailyTradesPerSymbolCap { max_trades_per_symbol: 3 };
        assert!(check.check(&context, &intent("AAPL.US", Side::Buy, 10, dec!(10))).is_err());
    }
}
