use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// Index of a [`Market`] inside an indexed lookup structure.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor,
)]
pub struct MarketIndex(pub usize);

impl MarketIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for MarketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarketIndex({})", self.0)
    }
}

/// Equity market a [`Symbol`](super::instrument::Symbol) trades on.
///
/// The market is derived from the symbol's suffix and determines time zone,
/// session schedule, default lot size and tick-size table.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename = "market", rename_all = "snake_case")]
pub enum Market {
    /// Hong Kong Stock Exchange.
    Hk,
    /// United States (NYSE/Nasdaq consolidated tape).
    Us,
    /// Mainland China A-shares (Shanghai/Shenzhen).
    Cn,
    /// Singapore Exchange.
    Sg,
}

impl Market {
    /// Derive the [`Market`] from a symbol's suffix, e.g. `0700.HK` -> [`Market::Hk`].
    ///
    /// Returns `None` if the suffix is unrecognised.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let suffix = symbol.rsplit('.').next()?;
        match suffix.to_ascii_uppercase().as_str() {
            "HK" => Some(Market::Hk),
            "US" => Some(Market::Us),
            "SH" | "SZ" => Some(Market::Cn),
            "SG" => Some(Market::Sg),
            _ => None,
        }
    }

    /// Return the &str representation of this [`Market`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Hk => "HK",
            Market::Us => "US",
            Market::Cn => "CN",
            Market::Sg => "SG",
        }
    }

    /// Currency positions on this market are denominated in.
    pub fn currency(&self) -> &'static str {
        match self {
            Market::Hk => "HKD",
            Market::Us => "USD",
            Market::Cn => "CNY",
            Market::Sg => "SGD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_from_symbol() {
        assert_eq!(Market::from_symbol("0700.HK"), Some(Market::Hk));
        assert_eq!(Market::from_symbol("AAPL.US"), Some(Market::Us));
        assert_eq!(Market::from_symbol("600519.SH"), Some(Market::Cn));
        assert_eq!(Market::from_symbol("000001.SZ"), Some(Market::Cn));
        assert_eq!(Market::from_symbol("D05.SG"), Some(Market::Sg));
        assert_eq!(Market::from_symbol("nonsense"), None);
    }

    #[test]
    fn test_de_market() {
        assert_eq!(
            serde_json::from_str::<Market>(r#""hk""#).unwrap(),
            Market::Hk
        );
    }

    #[test]
    fn test_currency() {
        assert_eq!(Market::Hk.currency(), "HKD");
        assert_eq!(Market::Cn.currency(), "CNY");
    }
}
