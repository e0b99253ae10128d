#![forbid(unsafe_code)]

pub mod error;
pub mod gateway;
pub mod simulated;
pub mod snapshot;

pub use error::QuoteError;
pub use gateway::{Adjust, QuoteGateway, SubType};
pub use simulated::SimulatedQuoteGateway;
pub use snapshot::{Depth, QuoteEvent, QuoteSnapshot, TradeStatus};
