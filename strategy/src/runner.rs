use crate::config::StrategyConfig;
use crate::event::MarketEvent;
use crate::Strategy;
use calendar::{Calendar, Session};
use chrono::{DateTime, Utc};
use instrument::watchlist::WatchlistResolver;
use queue::{SignalQueue, TradingIntent};
use quotes::{Adjust, QuoteGateway};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use store::Period;

/// Drives a fixed set of [`Strategy`]s over every open-market watchlist symbol on each tick,
/// publishing any resulting signal into the shared queue after deduplicating against
/// already-pending intents for the same symbol and side.
///
/// A strategy's [`crate::StrategySignal`] carries no quantity — sizing is not a per-strategy
/// heuristic, it is this runner's job: a fixed notional target per new position, divided by
/// the live quote. The router downstream still lot-rounds and cash-caps whatever quantity is
/// proposed here; this is only the strategy side's best-effort starting point.
pub struct StrategyRunner {
    strategies: Vec<Box<dyn Strategy>>,
    quotes: Arc<dyn QuoteGateway>,
    queue: Arc<SignalQueue>,
    watchlist: Arc<WatchlistResolver>,
    calendar: Arc<Calendar>,
    history_candles: usize,
    target_notional_per_signal: Decimal,
}

impl StrategyRunner {
    pub fn new(
        quotes: Arc<dyn QuoteGateway>,
        queue: Arc<SignalQueue>,
        watchlist: Arc<WatchlistResolver>,
        calendar: Arc<Calendar>,
        target_notional_per_signal: Decimal,
    ) -> Self {
        Self {
            strategies: Vec::new(),
            quotes,
            queue,
            watchlist,
            calendar,
            history_candles: 60,
            target_notional_per_signal,
        }
    }

    pub fn register(&mut self, mut strategy: Box<dyn Strategy>, config: &StrategyConfig) {
        strategy.on_start(config);
        self.strategies.push(strategy);
    }

    /// Poll every watchlist symbol whose market is in its regular session, evaluate every
    /// registered strategy against it, and publish the resulting signals.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let mut published = 0;
        for meta in self.watchlist.all() {
            if self.calendar.session_of(meta.market, now) != Session::Regular {
                continue;
            }

            let Ok(quotes) = self.quotes.get_realtime_quote(std::slice::from_ref(&meta.symbol)).await else {
                continue;
            };
            let Some(quote) = quotes.into_iter().next() else { continue };

            let Ok(candles) = self
                .quotes
                .get_candlesticks(&meta.symbol, Period::D1, self.history_candles, Adjust::Forward)
                .await
            else {
                continue;
            };
            if candles.len() < 2 {
                continue;
            }

            let daily_closes = candles.iter().map(|c| c.close).collect::<Vec<_>>();
            let daily_lows = candles.iter().map(|c| c.low).collect::<Vec<_>>();
            let event = MarketEvent {
                symbol: meta.symbol.clone(),
                quote,
                daily_closes,
                daily_lows,
                as_of: now,
            };

            for strategy in &mut self.strategies {
                let Some(signal) = strategy.on_event(&event) else { continue };

                if self.queue.has_pending(&event.symbol, Some(signal.side)).await {
                    tracing::debug!(symbol = %event.symbol, strategy = strategy.name(), "skipping duplicate pending intent");
                    continue;
                }

                if event.quote.last <= Decimal::ZERO {
                    continue;
                }
                let proposed_quantity = (self.target_notional_per_signal / event.quote.last)
                    .trunc()
                    .to_u64()
                    .unwrap_or(0);
                if proposed_quantity == 0 {
                    continue;
                }

                let mut intent = TradingIntent::new(
                    event.symbol.clone(),
                    signal.side,
                    proposed_quantity,
                    event.quote.last,
                    signal.score,
                    strategy.name(),
                    signal.urgency,
                    signal.max_slippage,
                    signal.reason.clone(),
                );
                if let Some(stop_loss) = signal.stop_loss {
                    intent = intent.with_stop_loss(stop_loss);
                }

                if self.queue.publish(&intent).await {
                    published += 1;
                } else {
                    tracing::warn!(symbol = %event.symbol, strategy = strategy.name(), "failed to publish strategy intent");
                }
            }
        }
        published
    }

    pub fn shutdown(&mut self) {
        for strategy in &mut self.strategies {
            strategy.on_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::StrategySignal;
    use chrono::TimeZone;
    use instrument::watchlist::StaticWatchlist;
    use instrument::{Market, Symbol, SymbolMeta};
    use queue::Side;
    use quotes::SimulatedQuoteGateway;
    use rust_decimal_macros::dec;
    use store::Candle;

    struct AlwaysBuyStrategy;

    impl Strategy for AlwaysBuyStrategy {
        fn name(&self) -> &str {
            "always_buy"
        }

        fn on_event(&mut self, _event: &MarketEvent) -> Option<StrategySignal> {
            Some(StrategySignal {
                side: Side::Buy,
                score: 75.0,
                urgency: 5,
                max_slippage: dec!(0.01),
                stop_loss: None,
                reason: "test fixture always buys".to_string(),
            })
        }
    }

    fn hk_regular_session() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 2, 0, 0).unwrap() // 10:00 Asia/Hong_Kong, a Wednesday
    }

    fn fixtures() -> (StrategyRunner, Arc<SignalQueue>) {
        let symbol = Symbol::new("0700.HK");
        let watchlist = Arc::new(
            WatchlistResolver::load(&StaticWatchlist(vec![SymbolMeta::new(
                symbol.clone(),
                Market::Hk,
                "HKD".into(),
                100,
                "Tencent".into(),
            )]))
            .unwrap(),
        );
        let gateway = Arc::new(SimulatedQuoteGateway::new());
        gateway.seed_static(SymbolMeta::new(symbol.clone(), Market::Hk, "HKD".into(), 100, "Tencent".into()));
        let candles = (0..30)
            .map(|day| Candle {
                symbol: symbol.clone(),
                period: store::Period::D1,
                timestamp: hk_regular_session() - chrono::Duration::days((30 - day) as i64),
                open: dec!(350),
                high: dec!(352),
                low: dec!(349),
                close: dec!(351),
                volume: 1_000_000,
                turnover: dec!(350_000_000),
            })
            .collect();
        gateway.seed_candles(symbol.clone(), store::Period::D1, candles);
        gateway.push_quote(quotes::QuoteSnapshot::new(
            symbol.clone(),
            dec!(351),
            dec!(350),
            dec!(350),
            dec!(352),
            dec!(349),
            1_000_000,
            dec!(350_000_000),
            dec!(350.8),
            dec!(351.2),
            500,
            500,
            quotes::TradeStatus::Normal,
            hk_regular_session(),
        ));
        let queue = Arc::new(SignalQueue::new(Arc::new(store::InMemoryKeyValueStore::new()), "acct1", 3));
        let calendar = Arc::new(Calendar::new());
        let runner = StrategyRunner::new(gateway, queue.clone(), watchlist, calendar, dec!(35_000));
        (runner, queue)
    }

    #[tokio::test]
    async fn test_tick_publishes_intent_for_open_market_symbol() {
        let (mut runner, queue) = fixtures();
        runner.register(Box::new(AlwaysBuyStrategy), &StrategyConfig::default());

        let published = runner.tick(hk_regular_session()).await;
        assert_eq!(published, 1);
        assert!(queue.has_pending(&Symbol::new("0700.HK"), Some(Side::Buy)).await);
    }

    #[tokio::test]
    async fn test_tick_dedupes_against_already_pending_intent() {
        let (mut runner, queue) = fixtures();
        runner.register(Box::new(AlwaysBuyStrategy), &StrategyConfig::default());

        assert_eq!(runner.tick(hk_regular_session()).await, 1);
        assert_eq!(runner.tick(hk_regular_session()).await, 0);
        assert_eq!(queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn test_tick_skips_symbols_outside_regular_session() {
        let (mut runner, _queue) = fixtures();
        runner.register(Box::new(AlwaysBuyStrategy), &StrategyConfig::default());

        let closed = Utc.with_ymd_and_hms(2024, 1, 10, 20, 0, 0).unwrap(); // 04:00 next day HKT
        assert_eq!(runner.tick(closed).await, 0);
    }
}
