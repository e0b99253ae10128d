use crate::exchange::Market;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One band of a [`TickTable`]: prices strictly below `upper_bound` use `tick`, rounded to
/// `decimals` places.
#[derive(Debug, Clone, Copy)]
struct TickBand {
    upper_bound: Decimal,
    tick: Decimal,
    decimals: u32,
}

/// Per-market minimum price increment table.
///
/// HK is banded (see [`TickTable::hk`]); US and CN are flat one-tick-for-all-prices tables.
#[derive(Debug, Clone)]
pub struct TickTable {
    bands: Vec<TickBand>,
}

impl TickTable {
    pub fn for_market(market: Market) -> Self {
        match market {
            Market::Hk => Self::hk(),
            Market::Us => Self::flat(dec!(0.01), 2),
            Market::Cn => Self::flat(dec!(0.01), 2),
            Market::Sg => Self::flat(dec!(0.001), 3),
        }
    }

    fn flat(tick: Decimal, decimals: u32) -> Self {
        Self {
            bands: vec![TickBand {
                upper_bound: Decimal::MAX,
                tick,
                decimals,
            }],
        }
    }

    /// Hong Kong's banded tick table, sorted ascending by `upper_bound` for binary search.
    fn hk() -> Self {
        let bands = vec![
            (dec!(0.25), dec!(0.001), 3),
            (dec!(0.50), dec!(0.005), 3),
            (dec!(10), dec!(0.01), 2),
            (dec!(20), dec!(0.02), 2),
            (dec!(100), dec!(0.05), 2),
            (dec!(200), dec!(0.10), 2),
            (dec!(500), dec!(0.20), 2),
            (dec!(1000), dec!(0.50), 2),
            (dec!(2000), dec!(1.00), 2),
            (dec!(5000), dec!(2.00), 2),
            (Decimal::MAX, dec!(5.00), 2),
        ];
        Self {
            bands: bands
                .into_iter()
                .map(|(upper_bound, tick, decimals)| TickBand {
                    upper_bound,
                    tick,
                    decimals,
                })
                .collect(),
        }
    }

    fn band_for(&self, price: Decimal) -> &TickBand {
        let idx = self
            .bands
            .partition_point(|band| band.upper_bound <= price)
            .min(self.bands.len() - 1);
        &self.bands[idx]
    }

    /// The tick size applicable to `price`.
    pub fn tick_for(&self, price: Decimal) -> Decimal {
        self.band_for(price).tick
    }

    /// Snap `price` to the nearest valid tick at or below `price`, rounded to the band's
    /// decimal precision.
    pub fn snap(&self, price: Decimal) -> Decimal {
        let band = self.band_for(price);
        if band.tick.is_zero() {
            return price.round_dp(band.decimals);
        }
        let ticks = (price / band.tick).round();
        (ticks * band.tick).round_dp(band.decimals)
    }

    /// Whether `price` already falls exactly on a valid tick.
    pub fn is_on_tick(&self, price: Decimal) -> bool {
        self.snap(price) == price.round_dp(self.band_for(price).decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_flat_tick() {
        let table = TickTable::for_market(Market::Us);
        assert_eq!(table.tick_for(dec!(1500.00)), dec!(0.01));
        assert_eq!(table.snap(dec!(150.403)), dec!(150.40));
    }

    #[test]
    fn test_hk_band_lookup() {
        let table = TickTable::for_market(Market::Hk);
        assert_eq!(table.tick_for(dec!(0.10)), dec!(0.001));
        assert_eq!(table.tick_for(dec!(0.30)), dec!(0.005));
        assert_eq!(table.tick_for(dec!(5.00)), dec!(0.01));
        assert_eq!(table.tick_for(dec!(350.40)), dec!(0.20));
        assert_eq!(table.tick_for(dec!(6000)), dec!(5.00));
    }

    #[test]
    fn test_hk_snap_already_on_tick() {
        let table = TickTable::for_market(Market::Hk);
        assert_eq!(table.snap(dec!(350.40)), dec!(350.40));
        assert!(table.is_on_tick(dec!(350.40)));
    }

    #[test]
    fn test_hk_snap_off_tick_rounds_to_nearest() {
        let table = TickTable::for_market(Market::Hk);
        // band for 350.45 is <500 -> tick 0.20: nearest multiple of 0.20 is 350.40
        assert_eq!(table.snap(dec!(350.45)), dec!(350.40));
    }
}
