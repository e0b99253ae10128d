#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(instrument::Symbol),

    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("subscription failed: {0}")]
    Subscription(String),
}
