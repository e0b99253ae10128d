use calendar::Calendar;
use chrono::{DateTime, Utc};
use instrument::{Market, Position};
use queue::{Side, TradingIntent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ta::signals::{IndicatorSnapshot, Regime};

const WEAK_POSITION_THRESHOLD: i32 = 40;
const STRONG_POSITION_THRESHOLD: i32 = 70;
const MIN_PROFIT_FOR_ROTATION: Decimal = dec!(-0.10);
const MAX_ROTATION_PCT: Decimal = dec!(0.30);
const SLIPPAGE_BUDGET: Decimal = dec!(0.8);

/// A holding scored for cross-timezone capital rotation (§4.4.3).
pub struct RotationCandidate<'a> {
    pub position: &'a Position,
    pub snapshot: IndicatorSnapshot,
    pub last_price: Decimal,
}

/// Compute a `0..=100` rotation score: higher means keep, lower means more sellable.
pub fn rotation_score(candidate: &RotationCandidate<'_>, now: DateTime<Utc>, regime: Regime) -> i32 {
    let mut score = 50;

    let profit_pct = profit_pct(candidate.position, candidate.last_price);
    score += pnl_bucket(profit_pct);

    let holding_hours = holding_hours(candidate.position, now);
    if holding_hours < dec!(0.5) {
        score += 10;
    } else if holding_hours > dec!(24) {
        score -= 10;
    }

    score += candidate.snapshot.rotation_technical_penalty();

    score += match regime {
        Regime::Bear => -15,
        Regime::Bull => 10,
        Regime::Range => 0,
    };

    score.clamp(0, 100)
}

fn pnl_bucket(profit_pct: Decimal) -> i32 {
    if profit_pct < dec!(-0.10) {
        -30
    } else if profit_pct < dec!(-0.05) {
        -20
    } else if profit_pct < Decimal::ZERO {
        -10
    } else if profit_pct > dec!(0.20) {
        30
    } else if profit_pct > dec!(0.10) {
        20
    } else if profit_pct > dec!(0.05) {
        10
    } else {
        0
    }
}

fn profit_pct(position: &Position, last_price: Decimal) -> Decimal {
    if position.average_cost.is_zero() {
        Decimal::ZERO
    } else {
        (last_price - position.average_cost) / position.average_cost
    }
}

fn holding_hours(position: &Position, now: DateTime<Utc>) -> Decimal {
    let seconds = (now - position.entry_time).num_seconds().max(0);
    Decimal::from(seconds) / dec!(3600)
}

/// A rotatable position: scored, annotated with whether it should actually be sold.
pub struct RotatablePosition<'a> {
    pub position: &'a Position,
    pub rotation_score: i32,
    pub profit_pct: Decimal,
    pub holding_hours: Decimal,
    pub market_value: Decimal,
    pub should_rotate: bool,
}

/// Score and filter every holding in `target_market`'s currency, sorted ascending by
/// rotation score (weakest, most sellable first).
pub fn identify_rotatable_positions<'a>(
    candidates: &[RotationCandidate<'a>],
    target_market: Market,
    now: DateTime<Utc>,
    regime: Regime,
) -> Vec<RotatablePosition<'a>> {
    let mut rotatable: Vec<RotatablePosition<'a>> = candidates
        .iter()
        .filter(|c| c.position.market == target_market)
        .map(|c| {
            let score = rotation_score(c, now, regime);
            let profit_pct = profit_pct(c.position, c.last_price);
            let holding_hours = holding_hours(c.position, now);
            let market_value = c.position.market_value(c.last_price);

            let weak = score < WEAK_POSITION_THRESHOLD || profit_pct < MIN_PROFIT_FOR_ROTATION;
            let protected = score >= STRONG_POSITION_THRESHOLD || holding_hours < dec!(0.5);

            RotatablePosition {
                position: c.position,
                rotation_score: score,
                profit_pct,
                holding_hours,
                market_value,
                should_rotate: weak && !protected,
            }
        })
        .collect();

    rotatable.sort_by_key(|r| r.rotation_score);
    rotatable
}

/// Accumulate `0.8 * market_value` of the weakest candidates, up to `30%` of total portfolio
/// value, returning the estimated releasable amount and the positions selected to sell.
pub fn calculate_releasable_capital<'a>(
    rotatable: &'a [RotatablePosition<'a>],
    total_position_value: Decimal,
) -> (Decimal, Vec<&'a RotatablePosition<'a>>) {
    let max_releasable = total_position_value * MAX_ROTATION_PCT;
    let mut releasable = Decimal::ZERO;
    let mut to_sell = Vec::new();

    for candidate in rotatable.iter().filter(|r| r.should_rotate) {
        if releasable >= max_releasable {
            break;
        }
        releasable += candidate.market_value * SLIPPAGE_BUDGET;
        to_sell.push(candidate);
    }

    (releasable, to_sell)
}

/// Emit SELL intents for the positions [`calculate_releasable_capital`] selected, excluding
/// the exact symbol the pending BUY wants and requiring the market to be currently open.
pub fn plan_rotation_sells(
    to_sell: &[&RotatablePosition<'_>],
    pending_buy_symbol: &instrument::Symbol,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> Vec<TradingIntent> {
    to_sell
        .iter()
        .filter(|candidate| &candidate.position.symbol != pending_buy_symbol)
        .filter(|candidate| calendar.is_open(&candidate.position.symbol, now))
        .map(|candidate| {
            TradingIntent::new(
                candidate.position.symbol.clone(),
                Side::Sell,
                candidate.position.quantity,
                candidate.position.average_cost,
                85.0,
                "capital_rotation",
                8,
                dec!(0.02),
                format!("rotation_score={}", candidate.rotation_score),
            )
        })
        .collect()
}

/// Priority-based capital allocator (§4.4.3): whether reserved-plus-available cash is
/// insufficient to fund every pending high-score BUY signal at an assumed 10% of equity
/// each.
pub fn capital_shortage(
    total_capital: Decimal,
    available_cash: Decimal,
    reserve_pct: Decimal,
    high_score_signal_count: usize,
) -> Decimal {
    let reserved_capital = total_capital * reserve_pct;
    let required_for_signals = Decimal::from(high_score_signal_count) * total_capital * dec!(0.10);
    let usable = available_cash - reserved_capital;
    (required_for_signals - usable).max(Decimal::ZERO)
}

/// `should_trigger_pre_close_rotation`: HK 15:30-16:00, US 15:00-16:00 (local exchange time).
pub fn should_trigger_pre_close_rotation(local_hour: u32, local_minute: u32, market: Market) -> bool {
    match market {
        Market::Hk => (local_hour == 15 && local_minute >= 30) || (local_hour == 16 && local_minute == 0),
        Market::Us => local_hour == 15 || (local_hour == 16 && local_minute == 0),
        Market::Cn | Market::Sg => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instrument::Symbol;

    fn position(symbol: &str, avg_cost: Decimal, entry_time: DateTime<Utc>) -> Position {
        Position::new(Symbol::new(symbol), 100, 100, avg_cost, "USD".into(), Market::Us, entry_time)
    }

    #[test]
    fn test_pnl_bucket_boundaries() {
        assert_eq!(pnl_bucket(dec!(-0.15)), -30);
        assert_eq!(pnl_bucket(dec!(-0.07)), -20);
        assert_eq!(pnl_bucket(dec!(-0.01)), -10);
        assert_eq!(pnl_bucket(dec!(0.25)), 30);
        assert_eq!(pnl_bucket(dec!(0.15)), 20);
        assert_eq!(pnl_bucket(dec!(0.07)), 10);
        assert_eq!(pnl_bucket(dec!(0.0)), 0);
    }

    #[test]
    fn test_rotation_score_protects_fresh_position() {
        let pos = position("AAPL.US", dec!(100), Utc::now());
        let candidate = RotationCandidate { position: &pos, snapshot: IndicatorSnapshot::default(), last_price: dec!(100) };
        let score = rotation_score(&candidate, Utc::now(), Regime::Range);
        assert_eq!(score, 60); // base 50 + fresh-position bonus 10
    }

    #[test]
    fn test_identify_rotatable_positions_protects_strong_fresh_holding() {
        let pos = position("AAPL.US", dec!(100), Utc::now());
        let candidate = RotationCandidate { position: &pos, snapshot: IndicatorSnapshot::default(), last_price: dec!(130) };
        let rotatable = identify_rotatable_positions(&[candidate], Market::Us, Utc::now(), Regime::Bull);
        assert!(!rotatable[0].should_rotate);
    }

    #[test]
    fn test_identify_rotatable_positions_flags_weak_loss() {
        let entry = Utc::now() - chrono::Duration::hours(48);
        let pos = position("AAPL.US", dec!(100), entry);
        let candidate = RotationCandidate { position: &pos, snapshot: IndicatorSnapshot::default(), last_price: dec!(85) };
        let rotatable = identify_rotatable_positions(&[candidate], Market::Us, Utc::now(), Regime::Bear);
        assert!(rotatable[0].should_rotate);
    }

    #[test]
    fn test_calculate_releasable_capital_respects_cap() {
        let entry = Utc::now() - chrono::Duration::hours(48);
        let positions: Vec<_> = (0..5).map(|i| position(&format!("S{i}.US"), dec!(100), entry)).collect();
        let candidates: Vec<_> = positions
            .iter()
            .map(|p| RotationCandidate { position: p, snapshot: IndicatorSnapshot::default(), last_price: dec!(80) })
            .collect();
        let rotatable = identify_rotatable_positions(&candidates, Market::Us, Utc::now(), Regime::Bear);
        let total_value: Decimal = rotatable.iter().map(|r| r.market_value).sum();
        let (releasable, to_sell) = calculate_releasable_capital(&rotatable, total_value);
        assert!(releasable <= total_value * MAX_ROTATION_PCT + dec!(1));
        assert!(!to_sell.is_empty());
    }

    #[test]
    fn test_should_trigger_pre_close_rotation_hk() {
        assert!(should_trigger_pre_close_rotation(15, 30, Market::Hk));
        assert!(should_trigger_pre_close_rotation(16, 0, Market::Hk));
        assert!(!should_trigger_pre_close_rotation(14, 59, Market::Hk));
    }

    #[test]
    fn test_should_trigger_pre_close_rotation_us() {
        assert!(should_trigger_pre_close_rotation(15, 5, Market::Us));
        assert!(should_trigger_pre_close_rotation(16, 0, Market::Us));
        assert!(!should_trigger_pre_close_rotation(14, 59, Market::Us));
    }

    #[test]
    fn test_capital_shortage_positive_when_underfunded() {
        let shortage = capital_shortage(dec!(100_000), dec!(5_000), dec!(0.15), 3);
        // required = 3 * 100_000 * 0.10 = 30_000; usable = 5_000 - 15_000 = -10_000
        assert_eq!(shortage, dec!(40_000));
    }

    #[test]
    fn test_capital_shortage_zero_when_funded() {
        let shortage = capital_shortage(dec!(100_000), dec!(50_000), dec!(0.15), 1);
        assert_eq!(shortage, Decimal::ZERO);
    }
}
