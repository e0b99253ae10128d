use calendar::Calendar;
use chrono::{DateTime, Utc};
use instrument::watchlist::WatchlistResolver;
use instrument::{Market, Position};
use queue::{Side, TradingIntent};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use ta::signals::{IndicatorSnapshot, IntradayStyle, Regime};

/// A holding paired with the technical snapshot used to score it for rebalancing.
pub struct ScoredHolding<'a> {
    pub position: &'a Position,
    pub snapshot: IndicatorSnapshot,
}

/// Regime-driven reserve-percentage and sell-plan generator (§4.4.2).
pub struct Rebalancer {
    pub afterhours_enabled: bool,
    pub afterhours_max_position_pct: Decimal,
}

impl Rebalancer {
    /// Classify the regime from a daily-close index proxy series (oldest first).
    pub fn classify(&self, index_proxy_closes: &[Decimal]) -> Regime {
        ta::signals::classify_regime(index_proxy_closes)
    }

    /// Reserve percentage after the intraday-style perturbation and the buying-power
    /// cross-currency-debt inflation, clamped to `[0, 0.9]`.
    pub fn reserve_pct(
        &self,
        regime: Regime,
        intraday: Option<IntradayStyle>,
        buying_power_negative_cash_positive: bool,
    ) -> Decimal {
        let mut reserve = regime.base_reserve_pct();
        match intraday {
            Some(IntradayStyle::Trend) => reserve -= dec!(0.05),
            Some(IntradayStyle::Range) => reserve += dec!(0.05),
            None => {}
        }
        reserve = reserve.clamp(Decimal::ZERO, dec!(0.9));

        if buying_power_negative_cash_positive {
            reserve = (reserve + dec!(0.20)).min(dec!(0.80));
        }
        reserve
    }

    /// Greedily plan lot-rounded SELL intents until `cut_value` of long exposure has been
    /// covered, gated by market-hours and (for post-market US sells) the afterhours cap.
    pub fn plan_sells(
        &self,
        cut_value: Decimal,
        holdings: &[ScoredHolding<'_>],
        calendar: &Calendar,
        now: DateTime<Utc>,
        watchlist: &WatchlistResolver,
    ) -> Vec<TradingIntent> {
        if cut_value <= Decimal::ZERO {
            return Vec::new();
        }

        let mut ranked: Vec<&ScoredHolding<'_>> = holdings.iter().collect();
        ranked.sort_by(|a, b| b.snapshot.weakness_score().cmp(&a.snapshot.weakness_score()));

        let mut remaining = cut_value;
        let mut sells = Vec::new();

        for holding in ranked {
            if remaining <= Decimal::ZERO {
                break;
            }
            let position = holding.position;
            let session = calendar.session_of(position.market, now);
            let is_afterhours = matches!(session, calendar::Session::Postmarket);
            let tradeable = session == calendar::Session::Regular || (is_afterhours && self.afterhours_enabled);
            if !tradeable {
                continue;
            }

            let price = holding.snapshot.close;
            if price.is_zero() {
                continue;
            }
            let position_value = price * Decimal::from(position.quantity);
            let mut sell_value = remaining.min(position_value);
            if is_afterhours {
                sell_value = sell_value.min(position_value * self.afterhours_max_position_pct);
            }

            let raw_qty = (sell_value / price).trunc().to_u64().unwrap_or(0).min(position.quantity);
            let lot_size = watchlist.lot_size(&position.symbol).unwrap_or(1).max(1);
            let sell_qty = (raw_qty / lot_size) * lot_size;
            if sell_qty == 0 {
                continue;
            }

            let reason = weakness_reason(&holding.snapshot);
            let mut intent = TradingIntent::new(
                position.symbol.clone(),
                Side::Sell,
                sell_qty,
                price,
                85.0,
                "regime_rebalancer",
                8,
                dec!(0.02),
                reason,
            );
            intent.score = 85.0;
            remaining -= price * Decimal::from(sell_qty);
            sells.push(intent);
        }

        sells
    }

    /// Group holdings' long exposure by currency bucket (HKD/.HK, CNY/.SH+.SZ, USD otherwise).
    pub fn exposure_by_currency(holdings: &[ScoredHolding<'_>]) -> HashMap<&'static str, Decimal> {
        let mut buckets: HashMap<&'static str, Decimal> = HashMap::new();
        for holding in holdings {
            let currency = currency_bucket(holding.position.market);
            let value = holding.snapshot.close * Decimal::from(holding.position.quantity);
            *buckets.entry(currency).or_insert(Decimal::ZERO) += value;
        }
        buckets
    }
}

fn currency_bucket(market: Market) -> &'static str {
    market.currency()
}

fn weakness_reason(snapshot: &IndicatorSnapshot) -> String {
    let mut reasons = Vec::new();
    if snapshot.sma20.is_some_and(|ma| snapshot.close < ma) {
        reasons.push("below_sma20");
    }
    if snapshot.sma50.is_some_and(|ma| snapshot.close < ma) {
        reasons.push("below_sma50");
    }
    if snapshot.donchian_low_breach {
        reasons.push("donchian_breakdown");
    }
    if snapshot.macd_bearish_cross {
        reasons.push("macd_bearish_cross");
    } else if snapshot.macd_negative_histogram {
        reasons.push("macd_negative_histogram");
    }
    if snapshot.sma20_slope_down {
        reasons.push("sma20_slope_down");
    }
    if reasons.is_empty() {
        "weak_relative_score".to_string()
    } else {
        reasons.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instrument::watchlist::StaticWatchlist;
    use instrument::{Symbol, SymbolMeta};

    fn position(symbol: &str, qty: u64, market: Market) -> Position {
        Position::new(Symbol::new(symbol), qty, qty, dec!(100), market.currency().into(), market, Utc::now())
    }

    fn watchlist(entries: &[(&str, Market, u64)]) -> WatchlistResolver {
        let metas = entries
            .iter()
            .map(|&(symbol, market, lot_size)| SymbolMeta::new(Symbol::new(symbol), market, market.currency().into(), lot_size, "".into()))
            .collect();
        WatchlistResolver::load(&StaticWatchlist(metas)).unwrap()
    }

    #[test]
    fn test_reserve_pct_bull_baseline() {
        let rebalancer = Rebalancer { afterhours_enabled: false, afterhours_max_position_pct: dec!(0.25) };
        assert_eq!(rebalancer.reserve_pct(Regime::Bull, None, false), dec!(0.15));
    }

    #[test]
    fn test_reserve_pct_buying_power_inflation_capped() {
        let rebalancer = Rebalancer { afterhours_enabled: false, afterhours_max_position_pct: dec!(0.25) };
        assert_eq!(rebalancer.reserve_pct(Regime::Bear, None, true), dec!(0.70));
    }

    #[test]
    fn test_reserve_pct_intraday_trend_reduces_reserve() {
        let rebalancer = Rebalancer { afterhours_enabled: false, afterhours_max_position_pct: dec!(0.25) };
        assert_eq!(rebalancer.reserve_pct(Regime::Range, Some(IntradayStyle::Trend), false), dec!(0.25));
    }

    #[test]
    fn test_plan_sells_empty_when_cut_value_non_positive() {
        let rebalancer = Rebalancer { afterhours_enabled: false, afterhours_max_position_pct: dec!(0.25) };
        let calendar = Calendar::new();
        let watchlist = watchlist(&[]);
        let sells = rebalancer.plan_sells(Decimal::ZERO, &[], &calendar, Utc::now(), &watchlist);
        assert!(sells.is_empty());
    }

    #[test]
    fn test_plan_sells_rounds_down_to_a_lot_multiple() {
        use chrono::TimeZone;
        let rebalancer = Rebalancer { afterhours_enabled: false, afterhours_max_position_pct: dec!(0.25) };
        let calendar = Calendar::new();
        let watchlist = watchlist(&[("0700.HK", Market::Hk, 100)]);
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 10, 2, 0, 0).unwrap(); // 10:00 HKT, a Wednesday

        let pos = position("0700.HK", 1_000, Market::Hk);
        let snap = IndicatorSnapshot { close: dec!(10), ..Default::default() };
        let holdings = vec![ScoredHolding { position: &pos, snapshot: snap }];

        // Cutting $3,250 at a $10 close wants 325 shares, which must round down to 300 (lot 100).
        let sells = rebalancer.plan_sells(dec!(3_250), &holdings, &calendar, now, &watchlist);
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].quantity_shares, 300);
    }

    #[test]
    fn test_exposure_by_currency_groups_correctly() {
        let pos_us = position("AAPL.US", 10, Market::Us);
        let pos_hk = position("0700.HK", 10, Market::Hk);
        let snap = IndicatorSnapshot { close: dec!(10), ..Default::default() };
        let holdings = vec![
            ScoredHolding { position: &pos_us, snapshot: snap },
            ScoredHolding { position: &pos_hk, snapshot: snap },
        ];
        let buckets = Rebalancer::exposure_by_currency(&holdings);
        assert_eq!(buckets.get("USD"), Some(&dec!(100)));
        assert_eq!(buckets.get("HKD"), Some(&dec!(100)));
    }
}
