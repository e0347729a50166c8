//! Durable store: entity models, keyed persistence and repositories.
//!
//! The backing store is a keyed value store (Redis in production, an
//! in-memory implementation for tests and local development). Repositories
//! keep every entity write atomic with its secondary-index memberships.

pub mod keys;
pub mod kv;
pub mod models;
pub mod redis_kv;
pub mod repositories;

pub use kv::{Kv, KvBatch, MemoryKv, StoreError};
pub use redis_kv::RedisKv;

use std::sync::Arc;

/// Shared handle to the configured store backend.
pub type KvHandle = Arc<dyn Kv>;

/// Connect to Redis at `url` and return a store handle.
pub async fn connect_redis(url: &str) -> Result<KvHandle, StoreError> {
    Ok(Arc::new(RedisKv::connect(url).await?))
}

/// In-memory store handle for tests and local development.
pub fn memory() -> KvHandle {
    Arc::new(MemoryKv::new())
}
