use chrono::{DateTime, Utc};
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-currency cash balance snapshot from the broker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Constructor)]
pub struct AssetBalance<AssetKey> {
    pub asset: AssetKey,
    pub balance: Balance,
    pub time_exchange: DateTime<Utc>,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize, Constructor,
)]
pub struct Balance {
    pub total: Decimal,
    pub free: Decimal,
    /// Remaining margin financing available on this currency, zero for a pure cash balance.
    /// Non-zero marks the account as margin-backed for cash-fallback purposes.
    pub margin_financing: Decimal,
}

impl Balance {
    pub fn used(&self) -> Decimal {
        self.total - self.free
    }

    pub fn is_margin(&self) -> bool {
        self.margin_financing > Decimal::ZERO
    }
}
