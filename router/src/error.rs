use instrument::Symbol;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("symbol {0} is not in the watchlist")]
    UnknownSymbol(Symbol),

    #[error("quantity must be greater than zero")]
    ZeroQuantity,

    #[error("adjusted quantity is 0 lots")]
    ZeroLots,

    #[error("last price is not positive: {0}")]
    NonPositivePrice(Decimal),

    #[error("broker error: {code}: {message}")]
    Broker { code: String, message: String },

    #[error("pre-trade risk check rejected: {0}")]
    RiskRejected(String),

    #[error("order {0} is already in a terminal state")]
    TerminalOrder(String),

    #[error("order {0} not found")]
    UnknownOrder(String),

    #[error("quote error: {0}")]
    Quote(#[from] quotes::QuoteError),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("instrument error: {0}")]
    Instrument(#[from] instrument::InstrumentError),

    #[error("fill polling exhausted after {0} poll errors")]
    PollExhausted(u32),

    #[error("fill polling deadline exceeded")]
    PollDeadline,
}
