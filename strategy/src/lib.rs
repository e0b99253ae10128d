#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! Strategy trait and runner for producing trading intents from market data.

pub mod config;
pub mod event;
pub mod runner;
pub mod signal;
pub mod trend;

pub use config::StrategyConfig;
pub use event::MarketEvent;
pub use runner::StrategyRunner;
pub use signal::StrategySignal;
pub use trend::TrendFollowingStrategy;

/// A strategy reacting to [`MarketEvent`]s and producing candidate [`StrategySignal`]s.
///
/// Lifecycle hooks mirror the process a long-lived strategy task goes through: configured
/// once at startup, polled on every tick, torn down on shutdown.
pub trait Strategy: Send + Sync {
    /// Human-readable name stamped onto every intent this strategy produces.
    fn name(&self) -> &str;

    /// Called once before the strategy begins processing events.
    fn on_start(&mut self, _config: &StrategyConfig) {}

    /// React to one symbol's market event, optionally producing a candidate signal.
    fn on_event(&mut self, event: &MarketEvent) -> Option<StrategySignal>;

    /// Called when the strategy is shutting down.
    fn on_stop(&mut self) {}
}
