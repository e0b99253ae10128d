use rust_decimal::Decimal;

/// Type of crossover event detected between two data series.
#[derive(Debug, PartialEq, Eq)]
pub enum Cross {
    Above,
    Below,
}

/// Determine if a crossover occurred between the previous and current values.
pub fn crossover(prev_fast: Decimal, prev_slow: Decimal, fast: Decimal, slow: Decimal) -> Option<Cross> {
    if prev_fast <= prev_slow && fast > slow {
        Some(Cross::Above)
    } else if prev_fast >= prev_slow && fast < slow {
        Some(Cross::Below)
    } else {
        None
    }
}

/// Lowest low over the trailing `period` candles (excluding the current one), the classic
/// Donchian channel floor used to flag breakdowns.
pub fn donchian_low(lows: &[Decimal], period: usize) -> Option<Decimal> {
    if lows.len() <= period {
        return None;
    }
    lows[lows.len() - 1 - period..lows.len() - 1]
        .iter()
        .copied()
        .reduce(Decimal::min)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: Decimal,
    pub signal: Decimal,
    pub histogram: Decimal,
}

impl Macd {
    pub fn is_bearish_cross(&self, previous: &Macd) -> bool {
        previous.macd >= previous.signal && self.macd < self.signal
    }

    pub fn is_negative_histogram(&self) -> bool {
        self.histogram < Decimal::ZERO
    }
}

/// Standard 12/26/9 MACD over a full `closes` series, returning `(macd_t-1, macd_t)` so
/// callers can detect a cross without re-running the EMA chain.
pub fn macd_series(closes: &[Decimal]) -> Option<(Macd, Macd)> {
    use crate::indicators::ExponentialMovingAverage;

    if closes.len() < 35 {
        return None;
    }
    let mut fast = ExponentialMovingAverage::new(12);
    let mut slow = ExponentialMovingAverage::new(26);
    let mut signal = ExponentialMovingAverage::new(9);

    let mut macd_line = Vec::with_capacity(closes.len());
    for &close in closes {
        let f = fast.update(close);
        let s = slow.update(close);
        macd_line.push(f - s);
    }

    let mut histories = Vec::with_capacity(macd_line.len());
    for &value in &macd_line {
        let sig = signal.update(value);
        histories.push(Macd { macd: value, signal: sig, histogram: value - sig });
    }

    let len = histories.len();
    Some((histories[len - 2], histories[len - 1]))
}

#[cfg(test)]
mod more_tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_donchian_low() {
        let lows = vec![dec!(10), dec!(8), dec!(9), dec!(7), dec!(11)];
        assert_eq!(donchian_low(&lows, 3), Some(dec!(7)));
    }

    #[test]
    fn test_macd_series_needs_enough_history() {
        let closes = vec![dec!(1); 10];
        assert!(macd_series(&closes).is_none());
    }
}
