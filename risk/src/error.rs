#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("no index proxy candles available for market {0:?}")]
    MissingIndexProxy(instrument::Market),
}
