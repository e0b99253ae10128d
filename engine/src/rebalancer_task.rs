use calendar::Calendar;
use chrono::{DateTime, Timelike, Utc};
use instrument::watchlist::WatchlistResolver;
use instrument::{Market, Position};
use queue::SignalQueue;
use quotes::{Adjust, QuoteGateway};
use risk::rebalancer::{Rebalancer, ScoredHolding};
use risk::rotation::{
    calculate_releasable_capital, capital_shortage, identify_rotatable_positions, plan_rotation_sells,
    should_trigger_pre_close_rotation, RotationCandidate,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use store::{Period, PersistenceStore};
use ta::signals::{classify_regime, snapshot};

/// Minimum score for a pending BUY to count against the capital allocator (§4.4.3).
const CAPITAL_ALLOCATOR_MIN_SIGNAL_SCORE: f64 = 70.0;

/// Drives the regime-based rebalancer (§4.4.2) and the pre-close leg of cross-timezone
/// capital rotation (§4.4.3) on a timer. On-demand rotation triggered by a specific
/// insufficient-cash BUY is the router's concern at validation time; this task only runs the
/// proactive sweep that stages capital ahead of a market's close.
pub struct RebalancerTask {
    persistence: Arc<dyn PersistenceStore>,
    quotes: Arc<dyn QuoteGateway>,
    queue: Arc<SignalQueue>,
    calendar: Arc<Calendar>,
    watchlist: Arc<WatchlistResolver>,
    rebalancer: Rebalancer,
    index_proxies: Vec<instrument::Symbol>,
}

impl RebalancerTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        persistence: Arc<dyn PersistenceStore>,
        quotes: Arc<dyn QuoteGateway>,
        queue: Arc<SignalQueue>,
        calendar: Arc<Calendar>,
        watchlist: Arc<WatchlistResolver>,
        afterhours_enabled: bool,
        afterhours_max_position_pct: Decimal,
        index_proxies: Vec<instrument::Symbol>,
    ) -> Self {
        Self {
            persistence,
            quotes,
            queue,
            calendar,
            watchlist,
            rebalancer: Rebalancer { afterhours_enabled, afterhours_max_position_pct },
            index_proxies,
        }
    }

    /// One rebalancer tick: classify the regime from the configured index proxies, size the
    /// long-exposure cut against current equity, log the capital allocator's shortage
    /// assessment, and publish the resulting SELL intents. Returns the number of intents
    /// published.
    pub async fn tick(&self, equity: Decimal, available_cash: Decimal, now: DateTime<Utc>) -> usize {
        let regime = self.classify_regime().await;
        let reserve_pct = self.rebalancer.reserve_pct(regime, None, false);

        let positions = match self.persistence.all_positions().await {
            Ok(positions) => positions,
            Err(error) => {
                tracing::warn!(%error, "rebalancer: failed to load positions, skipping tick");
                return 0;
            }
        };

        let mut holdings = Vec::with_capacity(positions.len());
        for position in &positions {
            let snap = self.snapshot_for(&position.symbol).await;
            holdings.push(ScoredHolding { position, snapshot: snap });
        }

        self.log_capital_shortage(equity, available_cash, reserve_pct).await;

        let long_exposure: Decimal = holdings.iter().map(|h| h.snapshot.close * Decimal::from(h.position.quantity)).sum();
        let target_long = equity * (Decimal::ONE - reserve_pct);
        let cut_value = (long_exposure - target_long).max(Decimal::ZERO);

        let sells = self.rebalancer.plan_sells(cut_value, &holdings, &self.calendar, now, &self.watchlist);
        self.publish(sells).await + self.pre_close_rotation(&positions, now, regime).await
    }

    /// Priority-based capital allocator (§4.4.3): whether reserved-plus-available cash can fund
    /// every pending high-score BUY signal, surfaced as a log line rather than its own action —
    /// the actual rotation it would trigger is already covered by `pre_close_rotation` and the
    /// router's own on-demand rotation at validation time.
    async fn log_capital_shortage(&self, equity: Decimal, available_cash: Decimal, reserve_pct: Decimal) {
        let pending_signals = self.queue.pending_high_score_buy_count(CAPITAL_ALLOCATOR_MIN_SIGNAL_SCORE).await;
        let shortage = capital_shortage(equity, available_cash, reserve_pct, pending_signals);
        if shortage > Decimal::ZERO {
            tracing::warn!(%shortage, pending_signals, %reserve_pct, "rebalancer: capital shortage for pending high-score signals");
        } else {
            tracing::debug!(pending_signals, %reserve_pct, "rebalancer: capital allocator has no shortage");
        }
    }

    /// Proactively stage capital ahead of a market's pre-close window (§11).
    async fn pre_close_rotation(&self, positions: &[Position], now: DateTime<Utc>, regime: ta::signals::Regime) -> usize {
        let mut published = 0;
        for &market in &[Market::Hk, Market::Us, Market::Cn, Market::Sg] {
            let local = now.with_timezone(&calendar_timezone(market));
            if !should_trigger_pre_close_rotation(local.hour(), local.minute(), market) {
                continue;
            }

            let mut candidates = Vec::new();
            let mut prices = Vec::new();
            for position in positions.iter().filter(|p| p.market == market) {
                let last_price = self
                    .quotes
                    .get_realtime_quote(std::slice::from_ref(&position.symbol))
                    .await
                    .ok()
                    .and_then(|q| q.into_iter().next())
                    .map(|q| q.last)
                    .unwrap_or(position.average_cost);
                prices.push((position, last_price));
            }
            for (position, last_price) in &prices {
                let snap = self.snapshot_for(&position.symbol).await;
                candidates.push(RotationCandidate { position, snapshot: snap, last_price: *last_price });
            }
            if candidates.is_empty() {
                continue;
            }

            let rotatable = identify_rotatable_positions(&candidates, market, now, regime);
            let total_value: Decimal = candidates.iter().map(|c| c.position.market_value(c.last_price)).sum();
            let (_releasable, to_sell) = calculate_releasable_capital(&rotatable, total_value);
            if to_sell.is_empty() {
                continue;
            }

            // No single pending BUY to exclude on a proactive sweep; any symbol is a candidate.
            let sells = plan_rotation_sells(&to_sell, &instrument::Symbol::new(""), &self.calendar, now);
            published += self.publish(sells).await;
        }
        published
    }

    async fn publish(&self, intents: Vec<queue::TradingIntent>) -> usize {
        let mut published = 0;
        for intent in intents {
            if self.queue.has_pending(&intent.symbol, Some(intent.side)).await {
                continue;
            }
            if self.queue.publish(&intent).await {
                published += 1;
            }
        }
        published
    }

    async fn classify_regime(&self) -> ta::signals::Regime {
        for proxy in &self.index_proxies {
            if let Ok(candles) = self.quotes.get_candlesticks(proxy, Period::D1, 60, Adjust::Forward).await {
                if candles.len() >= 51 {
                    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
                    return classify_regime(&closes);
                }
            }
        }
        ta::signals::Regime::Range
    }

    async fn snapshot_for(&self, symbol: &instrument::Symbol) -> ta::signals::IndicatorSnapshot {
        match self.quotes.get_candlesticks(symbol, Period::D1, 60, Adjust::Forward).await {
            Ok(candles) if candles.len() >= 2 => {
                let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
                let lows: Vec<Decimal> = candles.iter().map(|c| c.low).collect();
                snapshot(&closes, &lows)
            }
            _ => ta::signals::IndicatorSnapshot::default(),
        }
    }
}

fn calendar_timezone(market: Market) -> chrono_tz::Tz {
    match market {
        Market::Hk => chrono_tz::Asia::Hong_Kong,
        Market::Us => chrono_tz::America::New_York,
        Market::Cn => chrono_tz::Asia::Shanghai,
        Market::Sg => chrono_tz::Asia::Singapore,
    }
}
