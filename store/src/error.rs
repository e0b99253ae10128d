#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key-value backend error: {0}")]
    KeyValue(String),

    #[error("relational backend error: {0}")]
    Relational(String),

    #[error("serialisation error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(value: redis::RedisError) -> Self {
        StoreError::KeyValue(value.to_string())
    }
}
