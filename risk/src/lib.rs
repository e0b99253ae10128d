#![forbid(unsafe_code)]

//! Risk & capital controller: pre-trade validation, regime-based deleveraging and
//! cross-timezone capital rotation.

pub mod checks;
pub mod error;
pub mod pretrade;
pub mod rebalancer;
pub mod rotation;

pub use error::RiskError;
pub use pretrade::PreTradeValidator;
pub use rebalancer::{Rebalancer, ScoredHolding};
