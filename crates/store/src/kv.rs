//! Keyed store abstraction.
//!
//! The store speaks strings, sets, sorted sets and lists. Multi-key writes go
//! through [`KvBatch`], which every backend applies atomically: an entity
//! write and its index-membership changes either all land or none do.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::KitchenError;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from the keyed store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection error.
    #[error("store connection error: {0}")]
    Connection(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation error.
    #[error("store operation error: {0}")]
    Operation(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Operation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for KitchenError {
    fn from(err: StoreError) -> Self {
        KitchenError::StoreUnavailable(err.to_string())
    }
}

/// A single store command inside an atomic batch.
#[derive(Debug, Clone)]
pub enum KvCommand {
    Put { key: String, value: String },
    Delete { key: String },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    ZSetAdd { key: String, member: String, score: f64 },
    ZSetRemove { key: String, member: String },
    ListReplace { key: String, items: Vec<String> },
    Expire { key: String, ttl_secs: u64 },
}

/// Ordered list of commands applied atomically.
#[derive(Debug, Clone, Default)]
pub struct KvBatch {
    pub commands: Vec<KvCommand>,
}

impl KvBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.commands.push(KvCommand::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.commands.push(KvCommand::Delete { key: key.into() });
        self
    }

    pub fn set_add(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(KvCommand::SetAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn set_remove(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(KvCommand::SetRemove {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn zset_add(
        mut self,
        key: impl Into<String>,
        member: impl Into<String>,
        score: f64,
    ) -> Self {
        self.commands.push(KvCommand::ZSetAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn zset_remove(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(KvCommand::ZSetRemove {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn list_replace(mut self, key: impl Into<String>, items: Vec<String>) -> Self {
        self.commands.push(KvCommand::ListReplace {
            key: key.into(),
            items,
        });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl_secs: u64) -> Self {
        self.commands.push(KvCommand::Expire {
            key: key.into(),
            ttl_secs,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Keyed store operations shared by all backends.
#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;
    async fn zset_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;
    /// Members with `min <= score <= max`, ascending by score.
    async fn zset_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError>;
    /// Remove members scored strictly below `threshold`; returns how many.
    async fn zset_remove_below(&self, key: &str, threshold: f64) -> Result<u64, StoreError>;

    async fn list_replace(&self, key: &str, items: &[String]) -> Result<(), StoreError>;
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Apply a batch atomically.
    async fn apply(&self, batch: KvBatch) -> Result<(), StoreError>;
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    strings: HashMap<String, String>,
    sets: HashMap<String, std::collections::HashSet<String>>,
    zsets: HashMap<String, HashMap<String, f64>>,
    lists: HashMap<String, Vec<String>>,
    expiries: HashMap<String, Instant>,
}

impl MemoryInner {
    fn drop_if_expired(&mut self, key: &str) {
        let expired = self
            .expiries
            .get(key)
            .is_some_and(|deadline| Instant::now() >= *deadline);
        if expired {
            self.expiries.remove(key);
            self.strings.remove(key);
            self.sets.remove(key);
            self.zsets.remove(key);
            self.lists.remove(key);
        }
    }

    fn run(&mut self, command: KvCommand) {
        match command {
            KvCommand::Put { key, value } => {
                self.expiries.remove(&key);
                self.strings.insert(key, value);
            }
            KvCommand::Delete { key } => {
                self.expiries.remove(&key);
                self.strings.remove(&key);
                self.sets.remove(&key);
                self.zsets.remove(&key);
                self.lists.remove(&key);
            }
            KvCommand::SetAdd { key, member } => {
                self.sets.entry(key).or_default().insert(member);
            }
            KvCommand::SetRemove { key, member } => {
                if let Some(set) = self.sets.get_mut(&key) {
                    set.remove(&member);
                }
            }
            KvCommand::ZSetAdd { key, member, score } => {
                self.zsets.entry(key).or_default().insert(member, score);
            }
            KvCommand::ZSetRemove { key, member } => {
                if let Some(zset) = self.zsets.get_mut(&key) {
                    zset.remove(&member);
                }
            }
            KvCommand::ListReplace { key, items } => {
                self.lists.insert(key, items);
            }
            KvCommand::Expire { key, ttl_secs } => {
                self.expiries
                    .insert(key, Instant::now() + Duration::from_secs(ttl_secs));
            }
        }
    }
}

/// In-memory store for tests and local development.
///
/// A single mutex makes every batch atomic; expiries are enforced lazily on
/// read, which is all the queue-status cache needs.
#[derive(Default)]
pub struct MemoryKv {
    inner: Mutex<MemoryInner>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        Ok(inner.strings.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(key.to_string(), value.to_string());
        match ttl_secs {
            Some(ttl) => {
                inner
                    .expiries
                    .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl));
            }
            None => {
                inner.expiries.remove(key);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        let existed = inner.strings.remove(key).is_some()
            | inner.sets.remove(key).is_some()
            | inner.zsets.remove(key).is_some()
            | inner.lists.remove(key).is_some();
        inner.expiries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        Ok(inner.strings.contains_key(key)
            || inner.sets.contains_key(key)
            || inner.zsets.contains_key(key)
            || inner.lists.contains_key(key))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(set) = inner.sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        let mut members: Vec<String> = inner
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        Ok(inner
            .sets
            .get(key)
            .map(|set| set.contains(member))
            .unwrap_or(false))
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(zset) = inner.zsets.get_mut(key) {
            zset.remove(member);
        }
        Ok(())
    }

    async fn zset_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        let mut scored: Vec<(String, f64)> = inner
            .zsets
            .get(key)
            .map(|zset| {
                zset.iter()
                    .filter(|(_, score)| **score >= min && **score <= max)
                    .map(|(member, score)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(scored.into_iter().map(|(member, _)| member).collect())
    }

    async fn zset_remove_below(&self, key: &str, threshold: f64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = zset.len();
        zset.retain(|_, score| *score >= threshold);
        Ok((before - zset.len()) as u64)
    }

    async fn list_replace(&self, key: &str, items: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.lists.insert(key.to_string(), items.to_vec());
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.drop_if_expired(key);
        Ok(inner.lists.get(key).cloned().unwrap_or_default())
    }

    async fn apply(&self, batch: KvBatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        for command in batch.commands {
            inner.run(command);
        }
        Ok(())
    }
}
