#![forbid(unsafe_code)]

//! Durable, priority-ordered, at-least-once dispatch queue sitting between strategy/risk
//! signal generation and order execution.

pub mod error;
pub mod intent;
pub mod queue;

pub use error::QueueError;
pub use intent::{Side, TradingIntent};
pub use queue::{Collection, QueueStats, SignalQueue};
