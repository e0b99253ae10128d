#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("failed to (de)serialise queue payload: {0}")]
    Serde(#[from] serde_json::Error),
}
