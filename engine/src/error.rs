use thiserror::Error;

/// Root error type aggregating every component's own error enum via `#[from]`, per the
/// error-handling taxonomy: config errors are fatal at startup, everything else is a
/// per-task failure the scheduler logs and carries on past.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("calendar error: {0}")]
    Calendar(#[from] calendar::CalendarError),

    #[error("queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("router error: {0}")]
    Router(#[from] router::RouterError),

    #[error("risk error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("instrument error: {0}")]
    Instrument(#[from] instrument::InstrumentError),

    #[error("quote error: {0}")]
    Quote(#[from] quotes::QuoteError),
}

impl EngineError {
    /// Exit code per the external-interfaces contract: 0 normal, 1 fatal config error, 2
    /// broker auth failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Config(_) => 1,
            EngineError::Router(router::RouterError::Broker { code, .. }) if code == "AUTH" => 2,
            _ => 1,
        }
    }
}
