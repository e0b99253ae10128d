use crate::indicators::{rsi, slope, SimpleMovingAverage};
use crate::patterns::{donchian_low, macd_series};
use rust_decimal::Decimal;

/// Market regime classified from an index proxy's MA-20/MA-50 slope.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Regime {
    Bull,
    Range,
    Bear,
}

impl Regime {
    /// Cash reserve fraction the rebalancer targets for this regime, before the intraday
    /// and buying-power adjustments.
    pub fn base_reserve_pct(&self) -> Decimal {
        use rust_decimal_macros::dec;
        match self {
            Regime::Bull => dec!(0.15),
            Regime::Range => dec!(0.30),
            Regime::Bear => dec!(0.50),
        }
    }
}

/// Classify the regime of an index proxy from its daily closes (oldest first).
///
/// BULL requires MA-20 above MA-50 with a rising MA-20 slope; BEAR is the mirror image;
/// anything else (including insufficient history) is RANGE.
pub fn classify_regime(closes: &[Decimal]) -> Regime {
    if closes.len() < 51 {
        return Regime::Range;
    }

    let ma20_series = moving_average_series(closes, 20);
    let ma50_series = moving_average_series(closes, 50);
    let Some(&ma20) = ma20_series.last() else {
        return Regime::Range;
    };
    let Some(&ma50) = ma50_series.last() else {
        return Regime::Range;
    };
    let Some(ma20_slope) = slope(&ma20_series, 5) else {
        return Regime::Range;
    };

    if ma20 > ma50 && ma20_slope > Decimal::ZERO {
        Regime::Bull
    } else if ma20 < ma50 && ma20_slope < Decimal::ZERO {
        Regime::Bear
    } else {
        Regime::Range
    }
}

fn moving_average_series(closes: &[Decimal], period: usize) -> Vec<Decimal> {
    let mut sma = SimpleMovingAverage::new(period);
    closes
        .iter()
        .map(|&c| sma.update(c))
        .skip(period.saturating_sub(1))
        .collect()
}

/// Intraday style perturbing the regime's base reserve, from today's realised move vs ATR.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IntradayStyle {
    Trend,
    Range,
}

/// Shared technical snapshot consumed by both the rebalancer's weakness score and the
/// cross-timezone rotation score, so the two scorers never compute indicators differently.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorSnapshot {
    pub close: Decimal,
    pub sma20: Option<Decimal>,
    pub sma50: Option<Decimal>,
    pub sma20_slope_down: bool,
    pub donchian_low_breach: bool,
    pub macd_bearish_cross: bool,
    pub macd_negative_histogram: bool,
    pub rsi14: Option<Decimal>,
}

/// Compute an [`IndicatorSnapshot`] from a daily close/high/low series (oldest first).
/// Any indicator without enough history is left at its default (non-weak) value.
pub fn snapshot(closes: &[Decimal], lows: &[Decimal]) -> IndicatorSnapshot {
    let close = *closes.last().unwrap_or(&Decimal::ZERO);
    let sma20_series = moving_average_series(closes, 20);
    let sma50_series = moving_average_series(closes, 50);
    let sma20 = sma20_series.last().copied();
    let sma50 = sma50_series.last().copied();
    let sma20_slope_down = slope(&sma20_series, 3).is_some_and(|s| s < Decimal::ZERO);
    let donchian_low_breach = donchian_low(lows, 20).is_some_and(|low| close <= low);
    let (macd_bearish_cross, macd_negative_histogram) = match macd_series(closes) {
        Some((previous, current)) => (current.is_bearish_cross(&previous), current.is_negative_histogram()),
        None => (false, false),
    };
    let rsi14 = rsi(closes, 14);

    IndicatorSnapshot {
        close,
        sma20,
        sma50,
        sma20_slope_down,
        donchian_low_breach,
        macd_bearish_cross,
        macd_negative_histogram,
        rsi14,
    }
}

impl IndicatorSnapshot {
    /// Rebalancer weakness score (§4.4.2): higher means a weaker, more sellable holding.
    pub fn weakness_score(&self) -> i32 {
        let mut score = 0;
        if self.sma20.is_some_and(|ma| self.close < ma) {
            score += 15;
        }
        if self.sma50.is_some_and(|ma| self.close < ma) {
            score += 25;
        }
        if self.donchian_low_breach {
            score += 40;
        }
        if self.macd_bearish_cross {
            score += 15;
        } else if self.macd_negative_histogram {
            score += 5;
        }
        if self.sma20_slope_down {
            score += 5;
        }
        score
    }

    /// Technical-weakness component of the cross-timezone rotation score (§4.4.3): a
    /// negative adjustment in `[-40, 0]`, each factor independent.
    pub fn rotation_technical_penalty(&self) -> i32 {
        let mut penalty = 0;
        if self.rsi14.is_some_and(|rsi| rsi > Decimal::from(70)) {
            penalty -= 15;
        }
        if self.macd_bearish_cross {
            penalty -= 15;
        }
        if self.sma20.is_some_and(|ma| self.close < ma) {
            penalty -= 10;
        }
        if self.sma50.is_some_and(|ma| self.close < ma) {
            penalty -= 10;
        }
        penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rising_series(len: usize, start: i64) -> Vec<Decimal> {
        (0..len).map(|i| Decimal::from(start + i as i64)).collect()
    }

    #[test]
    fn test_classify_regime_bull_on_rising_series() {
        let closes = rising_series(60, 100);
        assert_eq!(classify_regime(&closes), Regime::Bull);
    }

    #[test]
    fn test_classify_regime_bear_on_falling_series() {
        let closes: Vec<Decimal> = rising_series(60, 100).into_iter().rev().collect();
        assert_eq!(classify_regime(&closes), Regime::Bear);
    }

    #[test]
    fn test_classify_regime_range_on_short_history() {
        let closes = rising_series(10, 100);
        assert_eq!(classify_regime(&closes), Regime::Range);
    }

    #[test]
    fn test_weakness_score_below_both_averages_and_donchian() {
        let mut closes = vec![dec!(100); 25];
        closes.push(dec!(50));
        let mut lows = vec![dec!(95); 25];
        lows.push(dec!(50));
        let snap = snapshot(&closes, &lows);
        assert!(snap.weakness_score() >= 15 + 25 + 40);
    }

    #[test]
    fn test_rotation_penalty_zero_when_no_weak_signals() {
        let closes = rising_series(60, 100);
        let lows = rising_series(60, 99);
        let snap = snapshot(&closes, &lows);
        assert_eq!(snap.rotation_technical_penalty(), 0);
    }

    #[test]
    fn test_regime_base_reserve_pct() {
        assert_eq!(Regime::Bull.base_reserve_pct(), dec!(0.15));
        assert_eq!(Regime::Range.base_reserve_pct(), dec!(0.30));
        assert_eq!(Regime::Bear.base_reserve_pct(), dec!(0.50));
    }
}
