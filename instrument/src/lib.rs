#![forbid(unsafe_code)]

//! Symbol, market and watchlist/lot-size data structures shared across the trading engine.

/// Defines [`exchange::Market`], the equity market a symbol trades on.
pub mod exchange;

/// Defines [`instrument::Symbol`], [`instrument::SymbolMeta`] and [`instrument::Position`].
pub mod instrument;

/// Defines the [`watchlist::WatchlistResolver`], the canonical tradeable symbol set and its
/// lot-size cache.
pub mod watchlist;

/// Defines [`error::InstrumentError`].
pub mod error;

pub use error::InstrumentError;
pub use exchange::Market;
pub use instrument::{Position, Symbol, SymbolMeta};
