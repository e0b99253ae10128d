use chrono::Utc;
use instrument::Symbol;
use quotes::{QuoteSnapshot, TradeStatus};
use rust_decimal_macros::dec;
use strategy::{MarketEvent, Strategy, StrategyConfig, TrendFollowingStrategy};

fn flat_event(symbol: &str, len: usize) -> MarketEvent {
    let closes = vec![dec!(100); len];
    let lows = vec![dec!(99); len];
    MarketEvent {
        symbol: Symbol::new(symbol),
        quote: QuoteSnapshot::new(
            Symbol::new(symbol),
            dec!(100),
            dec!(100),
            dec!(100),
            dec!(101),
            dec!(99),
            1_000,
            dec!(100_000),
            dec!(99.9),
            dec!(100.1),
            100,
            100,
            TradeStatus::Normal,
            Utc::now(),
        ),
        daily_closes: closes,
        daily_lows: lows,
        as_of: Utc::now(),
    }
}

#[test]
fn trend_following_strategy_stays_silent_on_flat_history() {
    let mut strat = TrendFollowingStrategy::new();
    strat.on_start(&StrategyConfig::default());
    let event = flat_event("0700.HK", 60);
    assert!(strat.on_event(&event).is_none());
    strat.on_stop();
}

#[test]
fn trend_following_strategy_name_is_stable() {
    let strat = TrendFollowingStrategy::new();
    assert_eq!(strat.name(), "trend_following");
}

#[test]
fn trend_following_strategy_default_matches_new() {
    let default_strat = TrendFollowingStrategy::default();
    assert_eq!(default_strat.name(), TrendFollowingStrategy::new().name());
}
