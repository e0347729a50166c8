//! Persistent queue projection, status cache and rolling history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{KitchenError, OrderPriority, StationType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::keys;
use crate::models::WorkflowOptimization;
use crate::repositories::{from_json, to_json};
use crate::KvHandle;

/// TTL of the cached queue status.
const STATUS_CACHE_TTL_SECS: u64 = 60 * 60;

/// Retention window of the queue-status history.
pub const HISTORY_RETENTION_SECS: i64 = 24 * 60 * 60;

/// Derived snapshot of the queue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueStatus {
    pub total_orders: usize,
    pub pending_orders: usize,
    pub processing_orders: usize,
    pub by_priority: BTreeMap<OrderPriority, usize>,
    /// Sum of total quantities over Pending/Processing orders per station.
    pub station_load: BTreeMap<StationType, u32>,
    /// Average wait over Pending orders, seconds.
    pub average_wait_secs: f64,
    pub overdue_orders: usize,
    pub generated_at: DateTime<Utc>,
}

impl Default for QueueStatus {
    fn default() -> Self {
        Self {
            total_orders: 0,
            pending_orders: 0,
            processing_orders: 0,
            by_priority: BTreeMap::new(),
            station_load: BTreeMap::new(),
            average_wait_secs: 0.0,
            overdue_orders: 0,
            generated_at: Utc::now(),
        }
    }
}

/// Repository for the persisted queue sequence and its derived artifacts.
#[derive(Clone)]
pub struct QueueRepository {
    kv: KvHandle,
}

impl QueueRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    // =========================================================================
    // Ordered id sequence
    // =========================================================================

    /// Persist the canonical id sequence.
    pub async fn save_ids(&self, ids: &[String]) -> Result<(), KitchenError> {
        self.kv.list_replace(keys::QUEUE, ids).await?;
        Ok(())
    }

    /// Load the persisted id sequence.
    pub async fn load_ids(&self) -> Result<Vec<String>, KitchenError> {
        Ok(self.kv.list_range(keys::QUEUE).await?)
    }

    // =========================================================================
    // Status cache + history
    // =========================================================================

    /// Cache the latest status snapshot (1h TTL).
    pub async fn cache_status(&self, status: &QueueStatus) -> Result<(), KitchenError> {
        self.kv
            .put(
                keys::QUEUE_STATUS,
                &to_json(status)?,
                Some(STATUS_CACHE_TTL_SECS),
            )
            .await?;
        Ok(())
    }

    pub async fn cached_status(&self) -> Result<Option<QueueStatus>, KitchenError> {
        match self.kv.get(keys::QUEUE_STATUS).await? {
            Some(raw) => Ok(Some(from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// Append a snapshot to the rolling history and prune entries older
    /// than the retention window.
    pub async fn append_history(&self, status: &QueueStatus) -> Result<(), KitchenError> {
        let score = status.generated_at.timestamp() as f64;
        self.kv
            .zset_add(keys::QUEUE_HISTORY, &to_json(status)?, score)
            .await?;

        let cutoff = (status.generated_at.timestamp() - HISTORY_RETENTION_SECS) as f64;
        let pruned = self.kv.zset_remove_below(keys::QUEUE_HISTORY, cutoff).await?;
        if pruned > 0 {
            tracing::debug!(pruned = pruned, "queue history pruned");
        }
        Ok(())
    }

    /// History snapshots with `from <= generated_at <= to`, oldest first.
    pub async fn history_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<QueueStatus>, KitchenError> {
        let raw = self
            .kv
            .zset_range_by_score(
                keys::QUEUE_HISTORY,
                from.timestamp() as f64,
                to.timestamp() as f64,
            )
            .await?;
        let mut snapshots = Vec::with_capacity(raw.len());
        for entry in raw {
            snapshots.push(from_json(&entry)?);
        }
        Ok(snapshots)
    }

    // =========================================================================
    // Workflow plans
    // =========================================================================

    pub async fn save_optimization(
        &self,
        plan: &WorkflowOptimization,
    ) -> Result<(), KitchenError> {
        self.kv
            .put(&keys::workflow(&plan.order_id), &to_json(plan)?, None)
            .await?;
        Ok(())
    }

    pub async fn optimization(
        &self,
        order_id: &str,
    ) -> Result<Option<WorkflowOptimization>, KitchenError> {
        match self.kv.get(&keys::workflow(order_id)).await? {
            Some(raw) => Ok(Some(from_json(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory;

    fn snapshot(pending: usize, at: DateTime<Utc>) -> QueueStatus {
        QueueStatus {
            total_orders: pending,
            pending_orders: pending,
            generated_at: at,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_queue_sequence_round_trip() {
        let repo = QueueRepository::new(memory());
        assert!(repo.load_ids().await.unwrap().is_empty());

        repo.save_ids(&["o2".into(), "o1".into()]).await.unwrap();
        assert_eq!(repo.load_ids().await.unwrap(), vec!["o2", "o1"]);

        repo.save_ids(&["o1".into()]).await.unwrap();
        assert_eq!(repo.load_ids().await.unwrap(), vec!["o1"]);
    }

    #[tokio::test]
    async fn test_status_cache_round_trip() {
        let repo = QueueRepository::new(memory());
        assert!(repo.cached_status().await.unwrap().is_none());

        repo.cache_status(&snapshot(3, Utc::now())).await.unwrap();
        let cached = repo.cached_status().await.unwrap().unwrap();
        assert_eq!(cached.pending_orders, 3);
    }

    #[tokio::test]
    async fn test_history_retention() {
        let repo = QueueRepository::new(memory());
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(HISTORY_RETENTION_SECS + 60);

        repo.append_history(&snapshot(1, stale)).await.unwrap();
        // Appending a fresh snapshot prunes anything outside the window.
        repo.append_history(&snapshot(2, now)).await.unwrap();

        let all = repo
            .history_range(now - chrono::Duration::days(7), now)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].pending_orders, 2);
    }

    #[tokio::test]
    async fn test_optimization_round_trip() {
        use crate::models::WorkflowOptimizationBuilder;

        let repo = QueueRepository::new(memory());
        assert!(repo.optimization("o1").await.unwrap().is_none());

        let plan = WorkflowOptimizationBuilder::new("o1").build(120);
        repo.save_optimization(&plan).await.unwrap();
        let loaded = repo.optimization("o1").await.unwrap().unwrap();
        assert_eq!(loaded.order_id, "o1");
    }
}
