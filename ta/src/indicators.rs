use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Simple moving average indicator.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
}

impl SimpleMovingAverage {
    /// Create a new SMA with the given period.
    pub fn new(period: usize) -> Self {
        Self { period, values: VecDeque::new(), sum: Decimal::ZERO }
    }

    /// Update the SMA with a new value and return the latest average.
    pub fn update(&mut self, value: Decimal) -> Decimal {
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.average()
    }

    /// Current average value.
    pub fn average(&self) -> Decimal {
        if self.values.is_empty() {
            Decimal::ZERO
        } else {
            self.sum / Decimal::from(self.values.len() as u64)
        }
    }
}

/// Exponential moving average indicator.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    multiplier: Decimal,
    value: Option<Decimal>,
}

impl ExponentialMovingAverage {
    /// Create a new EMA with the given period.
    pub fn new(period: usize) -> Self {
        let multiplier = Decimal::from(2u64) / Decimal::from(period as u64 + 1);
        Self { multiplier, value: None }
    }

    /// Update the EMA with a new price and return the latest value.
    pub fn update(&mut self, price: Decimal) -> Decimal {
        match self.value {
            Some(val) => {
                let next = (price - val) * self.multiplier + val;
                self.value = Some(next);
                next
            }
            None => {
                self.value = Some(price);
                price
            }
        }
    }

    /// Current EMA value if initialised.
    pub fn value(&self) -> Option<Decimal> {
        self.value
    }
}

/// Wilder's relative strength index, the classic 14-period momentum oscillator.
///
/// Returns `None` until `period` price changes have been observed.
pub fn rsi(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if closes.len() <= period {
        return None;
    }
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for window in closes.windows(2).take(period) {
        let change = window[1] - window[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }
    let mut avg_gain = gains / Decimal::from(period as u64);
    let mut avg_loss = losses / Decimal::from(period as u64);

    for window in closes.windows(2).skip(period) {
        let change = window[1] - window[0];
        let (gain, loss) = if change > Decimal::ZERO {
            (change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -change)
        };
        avg_gain = (avg_gain * Decimal::from(period as u64 - 1) + gain) / Decimal::from(period as u64);
        avg_loss = (avg_loss * Decimal::from(period as u64 - 1) + loss) / Decimal::from(period as u64);
    }

    if avg_loss.is_zero() {
        return Some(Decimal::from(100));
    }
    let rs = avg_gain / avg_loss;
    Some(Decimal::from(100) - Decimal::from(100) / (Decimal::ONE + rs))
}

/// Average true range over `period` candles, Wilder-smoothed starting from a simple mean.
pub fn atr(highs: &[Decimal], lows: &[Decimal], closes: &[Decimal], period: usize) -> Option<Decimal> {
    if highs.len() < period + 1 || highs.len() != lows.len() || highs.len() != closes.len() {
        return None;
    }
    let true_ranges: Vec<Decimal> = (1..highs.len())
        .map(|i| {
            let high_low = highs[i] - lows[i];
            let high_close = (highs[i] - closes[i - 1]).abs();
            let low_close = (lows[i] - closes[i - 1]).abs();
            high_low.max(high_close).max(low_close)
        })
        .collect();

    if true_ranges.len() < period {
        return None;
    }
    let mut atr = true_ranges[..period].iter().sum::<Decimal>() / Decimal::from(period as u64);
    for tr in &true_ranges[period..] {
        atr = (atr * Decimal::from(period as u64 - 1) + tr) / Decimal::from(period as u64);
    }
    Some(atr)
}

/// Slope of a moving-average series expressed as the sign-carrying difference between the
/// latest value and the value `lookback` samples earlier, normalised by that earlier value.
pub fn slope(series: &[Decimal], lookback: usize) -> Option<Decimal> {
    if series.len() <= lookback {
        return None;
    }
    let earlier = series[series.len() - 1 - lookback];
    let latest = series[series.len() - 1];
    if earlier.is_zero() {
        return None;
    }
    Some((latest - earlier) / earlier)
}

#[cfg(test)]
mod more_tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<Decimal> = (1..=20).map(Decimal::from).collect();
        let value = rsi(&closes, 14).unwrap();
        assert_eq!(value, dec!(100));
    }

    #[test]
    fn test_rsi_insufficient_data_is_none() {
        let closes = vec![dec!(1), dec!(2)];
        assert!(rsi(&closes, 14).is_none());
    }

    #[test]
    fn test_atr_flat_series_is_zero() {
        let highs = vec![dec!(10); 20];
        let lows = vec![dec!(10); 20];
        let closes = vec![dec!(10); 20];
        assert_eq!(atr(&highs, &lows, &closes, 14).unwrap(), dec!(0));
    }

    #[test]
    fn test_slope_positive() {
        let series = vec![dec!(10), dec!(11), dec!(12), dec!(15)];
        let s = slope(&series, 3).unwrap();
        assert_eq!(s, dec!(0.5));
    }
}
