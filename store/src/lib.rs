#![forbid(unsafe_code)]

//! Persistence layer: a relational-shaped store for K-lines/orders/fills/positions and a
//! key-value store for queue state, both behind swappable trait boundaries.

pub mod error;
pub mod kv;
pub mod memory_kv;
pub mod redis_kv;
pub mod relational;

pub use error::StoreError;
pub use kv::{KeyValueStore, ScoredEntry};
pub use memory_kv::InMemoryKeyValueStore;
pub use redis_kv::RedisKeyValueStore;
pub use relational::{Candle, FillRow, InMemoryPersistenceStore, OrderRow, Period, PersistenceStore};
