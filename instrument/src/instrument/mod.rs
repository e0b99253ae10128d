use crate::exchange::Market;
use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Formatter;

/// Defines the [`TickTable`] used to snap prices to a symbol's valid price increments.
pub mod tick;

/// Unique identifier for a [`Symbol`] inside an indexed lookup structure.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor,
)]
pub struct SymbolIndex(pub usize);

impl SymbolIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SymbolIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymbolIndex({})", self.0)
    }
}

/// An opaque symbol carrying a market suffix, e.g. `0700.HK`, `AAPL.US`, `600519.SH`.
///
/// The suffix determines time zone, session rules, lot size default and tick-size table.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(transparent)]
pub struct Symbol(pub SmolStr);

impl Symbol {
    pub fn new(raw: impl Into<SmolStr>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Derive this symbol's [`Market`], or `None` if the suffix is unrecognised.
    pub fn market(&self) -> Option<Market> {
        Market::from_symbol(self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Symbol::new(value)
    }
}

/// Static metadata about a tradeable [`Symbol`]: its market, currency, board lot and name.
///
/// Returned by the [watchlist resolver](crate::watchlist::WatchlistResolver) and cached by
/// callers that need lot-size/tick-size information on the hot path of order validation.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct SymbolMeta {
    pub symbol: Symbol,
    pub market: Market,
    pub currency: SmolStr,
    pub lot_size: u64,
    pub name: SmolStr,
}

impl SymbolMeta {
    /// Round `quantity` down to the nearest whole multiple of this symbol's board lot.
    ///
    /// Returns `0` if `quantity` is smaller than a single lot.
    pub fn round_down_to_lot(&self, quantity: u64) -> u64 {
        if self.lot_size == 0 {
            return quantity;
        }
        (quantity / self.lot_size) * self.lot_size
    }
}

/// Position held in a single symbol. Invariant: `available_quantity <= quantity`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: u64,
    pub available_quantity: u64,
    pub average_cost: Decimal,
    pub currency: SmolStr,
    pub market: Market,
    pub entry_time: chrono::DateTime<chrono::Utc>,
}

impl Position {
    /// Market value of this position at `last_price`.
    pub fn market_value(&self, last_price: Decimal) -> Decimal {
        Decimal::from(self.quantity) * last_price
    }

    pub fn holding_duration(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::Duration {
        now - self.entry_time
    }

    pub fn unrealised_pnl_pct(&self, last_price: Decimal) -> Option<Decimal> {
        if self.average_cost.is_zero() {
            return None;
        }
        Some((last_price - self.average_cost) / self.average_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Market;

    #[test]
    fn test_symbol_market() {
        let symbol = Symbol::new("0700.HK");
        assert_eq!(symbol.market(), Some(Market::Hk));
    }

    #[test]
    fn test_round_down_to_lot() {
        let meta = SymbolMeta::new(
            Symbol::new("0700.HK"),
            Market::Hk,
            "HKD".into(),
            100,
            "Tencent".into(),
        );
        assert_eq!(meta.round_down_to_lot(350), 300);
        assert_eq!(meta.round_down_to_lot(99), 0);
        assert_eq!(meta.round_down_to_lot(100), 100);
    }

    #[test]
    fn test_unrealised_pnl_pct() {
        use rust_decimal_macros::dec;
        let position = Position::new(
            Symbol::new("AAPL.US"),
            100,
            100,
            dec!(150.00),
            "USD".into(),
            Market::Us,
            chrono::Utc::now(),
        );
        assert_eq!(
            position.unrealised_pnl_pct(dec!(165.00)),
            Some(dec!(0.1))
        );
    }
}
