use crate::config::StrategyConfig;
use crate::event::MarketEvent;
use crate::signal::StrategySignal;
use crate::Strategy;
use queue::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ta::patterns::macd_series;
use ta::signals::{classify_regime, snapshot, Regime};

/// Momentum entry strategy over daily closes: buys into a confirmed bull regime on a fresh
/// bullish MACD cross above both moving averages. Exits are left to the risk controller's
/// regime rebalancer and cross-timezone rotation, which already rank and sell existing
/// holdings by the same weakness score this crate's indicator snapshot exposes — a strategy
/// runner proposing its own exits would duplicate that sizing decision without visibility
/// into the account's actual position quantities.
#[derive(Debug, Clone)]
pub struct TrendFollowingStrategy {
    stop_loss_atr_multiple: Decimal,
}

impl TrendFollowingStrategy {
    pub fn new() -> Self {
        Self { stop_loss_atr_multiple: dec!(2.0) }
    }
}

impl Default for TrendFollowingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &str {
        "trend_following"
    }

    fn on_start(&mut self, config: &StrategyConfig) {
        self.stop_loss_atr_multiple = Decimal::try_from(config.get_or("trend.stop_loss_atr_multiple", 2.0)).unwrap_or(dec!(2.0));
    }

    fn on_event(&mut self, event: &MarketEvent) -> Option<StrategySignal> {
        let regime = classify_regime(&event.daily_closes);
        let snap = snapshot(&event.daily_closes, &event.daily_lows);

        if regime != Regime::Bull {
            return None;
        }

        let bullish_cross = macd_series(&event.daily_closes).is_some_and(|(previous, current)| {
            previous.macd <= previous.signal && current.macd > current.signal
        });
        if !bullish_cross {
            return None;
        }
        let above_averages = snap.sma20.is_some_and(|ma| snap.close > ma) && snap.sma50.is_some_and(|ma| snap.close > ma);
        if !above_averages {
            return None;
        }

        let stop_loss = event
            .daily_lows
            .iter()
            .rev()
            .take(20)
            .copied()
            .reduce(Decimal::min)
            .map(|low| low.min(snap.close * (Decimal::ONE - self.stop_loss_atr_multiple / dec!(100))));

        Some(StrategySignal {
            side: Side::Buy,
            score: 80.0,
            urgency: 5,
            max_slippage: dec!(0.01),
            stop_loss,
            reason: "bull regime with fresh bullish MACD cross above both moving averages".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use instrument::Symbol;
    use quotes::QuoteSnapshot;
    use quotes::TradeStatus;

    fn quote(symbol: &str, last: Decimal) -> QuoteSnapshot {
        QuoteSnapshot::new(
            Symbol::new(symbol),
            last,
            last,
            last,
            last,
            last,
            1_000,
            dec!(0),
            last - dec!(0.1),
            last + dec!(0.1),
            100,
            100,
            TradeStatus::Normal,
            Utc::now(),
        )
    }

    fn steadily_rising(len: usize, start: i64) -> Vec<Decimal> {
        (0..len).map(|i| Decimal::from(start + i as i64)).collect()
    }

    #[test]
    fn test_on_event_no_signal_without_enough_history() {
        let mut strat = TrendFollowingStrategy::new();
        let closes = steadily_rising(10, 100);
        let event = MarketEvent {
            symbol: Symbol::new("0700.HK"),
            quote: quote("0700.HK", dec!(109)),
            daily_closes: closes.clone(),
            daily_lows: closes,
            as_of: Utc::now(),
        };
        assert!(strat.on_event(&event).is_none());
    }

    #[test]
    fn test_on_event_no_signal_in_falling_regime() {
        let mut strat = TrendFollowingStrategy::new();
        let closes: Vec<Decimal> = steadily_rising(60, 100).into_iter().rev().collect();
        let event = MarketEvent {
            symbol: Symbol::new("0700.HK"),
            quote: quote("0700.HK", closes[closes.len() - 1]),
            daily_closes: closes.clone(),
            daily_lows: closes,
            as_of: Utc::now(),
        };
        assert!(strat.on_event(&event).is_none());
    }

    #[test]
    fn test_on_start_applies_config_overrides() {
        let mut strat = TrendFollowingStrategy::new();
        let mut parameters = std::collections::HashMap::new();
        parameters.insert("trend.stop_loss_atr_multiple".to_string(), 3.5);
        strat.on_start(&StrategyConfig { parameters });
        assert_eq!(strat.stop_loss_atr_multiple, dec!(3.5));
    }
}
