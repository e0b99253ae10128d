use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use quotes::QuoteGateway;
use risk::checks::RiskContext;
use router::{Broker, RiskContextProvider};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use store::PersistenceStore;

/// Serves the last snapshot a [`RiskContextRefresher`] computed. [`RiskContextProvider::context`]
/// is synchronous (pre-trade validation must not suspend on the store or broker mid-check), so
/// the snapshot is refreshed out-of-band and read from an in-memory cache here.
pub struct CachedRiskContext {
    shared: Arc<RwLock<RiskContext>>,
}

impl CachedRiskContext {
    pub fn new(shared: Arc<RwLock<RiskContext>>) -> Self {
        Self { shared }
    }
}

impl RiskContextProvider for CachedRiskContext {
    fn context(&self) -> RiskContext {
        self.shared.read().clone()
    }
}

/// Recomputes equity, cash, exposure, per-symbol position notional and daily order/trade
/// counts from the broker and persistence layer, tracking a running peak equity for drawdown.
pub struct RiskContextRefresher {
    broker: Arc<dyn Broker>,
    persistence: Arc<dyn PersistenceStore>,
    quotes: Arc<dyn QuoteGateway>,
    peak_equity: RwLock<Decimal>,
}

impl RiskContextRefresher {
    pub fn new(broker: Arc<dyn Broker>, persistence: Arc<dyn PersistenceStore>, quotes: Arc<dyn QuoteGateway>) -> Self {
        Self { broker, persistence, quotes, peak_equity: RwLock::new(Decimal::ZERO) }
    }

    /// Recompute a fresh [`RiskContext`] from current broker balances and persisted positions.
    ///
    /// Also reconciles the persisted position table against the broker's own book, since the
    /// broker is the only source of truth for what a fill actually did to a holding: positions
    /// the broker no longer reports are removed, and the rest are upserted with the broker's
    /// quantity/cost basis before this snapshot is computed. Daily order/trade counts are
    /// likewise derived from the broker's own order history rather than threaded through by
    /// the caller, filtered to orders submitted since `counters_since` (the scheduler's last
    /// market-open transition).
    pub async fn refresh(
        &self,
        counters_since: DateTime<Utc>,
        daily_realised_pnl: Decimal,
    ) -> Result<RiskContext, crate::error::EngineError> {
        let balances = self.broker.account_balance(None).await?;
        let available_cash: HashMap<String, Decimal> = balances.iter().map(|(ccy, bal)| (ccy.clone(), bal.free)).collect();
        let remaining_margin_financing: Decimal = balances.values().map(|bal| bal.margin_financing).sum();

        let today_orders = self.broker.today_orders().await?;
        let mut daily_trades_per_symbol: HashMap<instrument::Symbol, u32> = HashMap::new();
        let mut daily_order_count = 0u32;
        for order in today_orders.iter().filter(|order| order.submitted_at >= counters_since) {
            daily_order_count += 1;
            *daily_trades_per_symbol.entry(order.symbol.clone()).or_insert(0) += 1;
        }

        self.reconcile_positions().await?;
        let positions = self.persistence.all_positions().await?;
        let mut position_quantity = HashMap::new();
        let mut position_notional = HashMap::new();
        let mut long_exposure = Decimal::ZERO;
        let short_exposure = Decimal::ZERO;
        let mut equity: Decimal = available_cash.values().copied().sum();

        for position in &positions {
            let last_price = self
                .quotes
                .get_realtime_quote(std::slice::from_ref(&position.symbol))
                .await
                .ok()
                .and_then(|q| q.into_iter().next())
                .map(|q| q.last)
                .unwrap_or(position.average_cost);

            let notional = position.market_value(last_price);
            position_quantity.insert(position.symbol.clone(), position.quantity);
            position_notional.insert(position.symbol.clone(), notional);
            long_exposure += notional;
            equity += notional;
        }

        let mut peak = self.peak_equity.write();
        if equity > *peak {
            *peak = equity;
        }
        let portfolio_drawdown = if peak.is_zero() { Decimal::ZERO } else { (*peak - equity) / *peak };

        Ok(RiskContext {
            equity,
            available_cash,
            position_quantity,
            position_notional,
            long_exposure,
            short_exposure,
            daily_realised_pnl,
            portfolio_drawdown,
            daily_order_count,
            daily_trades_per_symbol,
            remaining_margin_financing,
        })
    }

    async fn reconcile_positions(&self) -> Result<(), crate::error::EngineError> {
        let broker_positions = self.broker.stock_positions().await?;
        let persisted = self.persistence.all_positions().await?;

        for position in &broker_positions {
            self.persistence.upsert_position(position.clone()).await?;
        }
        let live: std::collections::HashSet<_> = broker_positions.iter().map(|p| p.symbol.clone()).collect();
        for stale in persisted.into_iter().filter(|p| !live.contains(&p.symbol)) {
            self.persistence.remove_position(&stale.symbol).await?;
        }
        Ok(())
    }
}
