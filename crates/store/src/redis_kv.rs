//! Redis store backend.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use crate::kv::{Kv, KvBatch, KvCommand, StoreError};

/// Redis-backed store using a shared connection manager.
#[derive(Clone)]
pub struct RedisKv {
    connection_manager: ConnectionManager,
}

impl RedisKv {
    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)
            .map_err(|e| StoreError::Connection(format!("Failed to create client: {}", e)))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {}", e)))?;

        tracing::info!(url = %url, "Connected to Redis store");

        Ok(Self { connection_manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection_manager.clone()
    }

    /// Health check - ping the server.
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response == "PONG" {
            Ok(true)
        } else {
            Err(StoreError::Operation(format!(
                "Unexpected PING response: {}",
                response
            )))
        }
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.conn();
        match ttl_secs {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        tracing::trace!(key = %key, ttl = ?ttl_secs, "store PUT");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let mut members: Vec<String> = conn.smembers(key).await?;
        members.sort();
        Ok(members)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let contained: bool = conn.sismember(key, member).await?;
        Ok(contained)
    }

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zset_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = conn.zrem(key, member).await?;
        Ok(())
    }

    async fn zset_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.zrangebyscore(key, min, max).await?;
        Ok(members)
    }

    async fn zset_remove_below(&self, key: &str, threshold: f64) -> Result<u64, StoreError> {
        let mut conn = self.conn();
        let removed: u64 = conn
            .zrembyscore(key, "-inf", format!("({}", threshold))
            .await?;
        Ok(removed)
    }

    async fn list_replace(&self, key: &str, items: &[String]) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key);
        if !items.is_empty() {
            pipe.rpush(key, items);
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let items: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(items)
    }

    async fn apply(&self, batch: KvBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in &batch.commands {
            match command {
                KvCommand::Put { key, value } => {
                    pipe.set(key, value);
                }
                KvCommand::Delete { key } => {
                    pipe.del(key);
                }
                KvCommand::SetAdd { key, member } => {
                    pipe.sadd(key, member);
                }
                KvCommand::SetRemove { key, member } => {
                    pipe.srem(key, member);
                }
                KvCommand::ZSetAdd { key, member, score } => {
                    pipe.zadd(key, member, *score);
                }
                KvCommand::ZSetRemove { key, member } => {
                    pipe.zrem(key, member);
                }
                KvCommand::ListReplace { key, items } => {
                    pipe.del(key);
                    if !items.is_empty() {
                        pipe.rpush(key, items);
                    }
                }
                KvCommand::Expire { key, ttl_secs } => {
                    pipe.expire(key, *ttl_secs as i64);
                }
            }
        }

        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        tracing::trace!(commands = batch.commands.len(), "store batch applied");
        Ok(())
    }
}
