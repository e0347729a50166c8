//! Order repository with secondary indexes and analytic scans.

use chrono::{DateTime, Utc};
use common::{KitchenError, OrderPriority, OrderStatus, StationType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::keys;
use crate::kv::KvBatch;
use crate::models::Order;
use crate::repositories::{from_json, to_json};
use crate::KvHandle;

/// Repository for order persistence.
#[derive(Clone)]
pub struct OrderRepository {
    kv: KvHandle,
}

impl OrderRepository {
    pub fn new(kv: KvHandle) -> Self {
        Self { kv }
    }

    /// Index memberships derived from the order itself.
    fn membership_batch(order: &Order, batch: KvBatch) -> KvBatch {
        let mut batch = batch
            .set_add(keys::ORDER_ALL, &order.id)
            .set_add(keys::order_by_status(order.status), &order.id)
            .set_add(keys::order_by_priority(order.priority), &order.id)
            .set_add(keys::order_by_customer(&order.customer_id), &order.id)
            .zset_add(
                keys::order_by_date(order.created_at.date_naive()),
                &order.id,
                order.created_at.timestamp() as f64,
            );
        if let Some(staff_id) = &order.assigned_staff_id {
            batch = batch.set_add(keys::order_by_staff(staff_id), &order.id);
        }
        batch
    }

    /// Persist a new order; the id must be unused.
    pub async fn create(&self, order: &Order) -> Result<(), KitchenError> {
        let key = keys::order(&order.id);
        if self.kv.exists(&key).await? {
            return Err(KitchenError::Conflict(format!(
                "order {} already exists",
                order.id
            )));
        }

        let batch = Self::membership_batch(order, KvBatch::new().put(&key, to_json(order)?));
        self.kv.apply(batch).await?;
        tracing::debug!(order_id = %order.id, status = %order.status, "order created");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Order, KitchenError> {
        match self.kv.get(&keys::order(id)).await? {
            Some(raw) => Ok(from_json(&raw)?),
            None => Err(KitchenError::NotFound(format!("order {id} not found"))),
        }
    }

    /// Persist a changed order, moving it between the indexes whose
    /// memberships changed; one atomic batch.
    pub async fn update(&self, order: &Order) -> Result<(), KitchenError> {
        let previous = self.get(&order.id).await?;
        let now = Utc::now();

        let mut batch = KvBatch::new().put(keys::order(&order.id), to_json(order)?);

        if previous.status != order.status {
            batch = batch
                .set_remove(keys::order_by_status(previous.status), &order.id)
                .set_add(keys::order_by_status(order.status), &order.id);
        }
        if previous.priority != order.priority {
            batch = batch
                .set_remove(keys::order_by_priority(previous.priority), &order.id)
                .set_add(keys::order_by_priority(order.priority), &order.id);
        }
        if previous.assigned_staff_id != order.assigned_staff_id {
            if let Some(old_staff) = &previous.assigned_staff_id {
                batch = batch.set_remove(keys::order_by_staff(old_staff), &order.id);
            }
            if let Some(new_staff) = &order.assigned_staff_id {
                batch = batch.set_add(keys::order_by_staff(new_staff), &order.id);
            }
        }
        batch = if order.is_overdue(now) {
            batch.set_add(keys::ORDER_OVERDUE, &order.id)
        } else {
            batch.set_remove(keys::ORDER_OVERDUE, &order.id)
        };

        self.kv.apply(batch).await?;
        tracing::debug!(order_id = %order.id, status = %order.status, "order updated");
        Ok(())
    }

    /// Delete an order and every index membership in one batch.
    pub async fn delete(&self, id: &str) -> Result<(), KitchenError> {
        let order = self.get(id).await?;

        let mut batch = KvBatch::new()
            .delete(keys::order(id))
            .set_remove(keys::ORDER_ALL, id)
            .set_remove(keys::order_by_status(order.status), id)
            .set_remove(keys::order_by_priority(order.priority), id)
            .set_remove(keys::order_by_customer(&order.customer_id), id)
            .zset_remove(keys::order_by_date(order.created_at.date_naive()), id)
            .set_remove(keys::ORDER_OVERDUE, id);
        if let Some(staff_id) = &order.assigned_staff_id {
            batch = batch.set_remove(keys::order_by_staff(staff_id), id);
        }

        self.kv.apply(batch).await?;
        tracing::debug!(order_id = %id, "order deleted");
        Ok(())
    }

    /// Refresh the overdue-set membership of one order.
    pub async fn sync_overdue(&self, order: &Order, now: DateTime<Utc>) -> Result<(), KitchenError> {
        if order.is_overdue(now) {
            self.kv.set_add(keys::ORDER_OVERDUE, &order.id).await?;
        } else {
            self.kv.set_remove(keys::ORDER_OVERDUE, &order.id).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Index reads
    // =========================================================================

    async fn get_many(&self, ids: Vec<String>) -> Result<Vec<Order>, KitchenError> {
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            match self.kv.get(&keys::order(&id)).await? {
                Some(raw) => orders.push(from_json(&raw)?),
                None => tracing::warn!(order_id = %id, "index points at missing order"),
            }
        }
        Ok(orders)
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, KitchenError> {
        let ids = self.kv.set_members(keys::ORDER_ALL).await?;
        self.get_many(ids).await
    }

    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, KitchenError> {
        let ids = self.kv.set_members(&keys::order_by_status(status)).await?;
        self.get_many(ids).await
    }

    pub async fn list_by_priority(
        &self,
        priority: OrderPriority,
    ) -> Result<Vec<Order>, KitchenError> {
        let ids = self
            .kv
            .set_members(&keys::order_by_priority(priority))
            .await?;
        self.get_many(ids).await
    }

    pub async fn list_by_customer(&self, customer_id: &str) -> Result<Vec<Order>, KitchenError> {
        let ids = self
            .kv
            .set_members(&keys::order_by_customer(customer_id))
            .await?;
        self.get_many(ids).await
    }

    pub async fn list_by_staff(&self, staff_id: &str) -> Result<Vec<Order>, KitchenError> {
        let ids = self.kv.set_members(&keys::order_by_staff(staff_id)).await?;
        self.get_many(ids).await
    }

    /// Orders created on `date`, oldest first.
    pub async fn list_by_date(&self, date: chrono::NaiveDate) -> Result<Vec<Order>, KitchenError> {
        let ids = self
            .kv
            .zset_range_by_score(&keys::order_by_date(date), f64::MIN, f64::MAX)
            .await?;
        self.get_many(ids).await
    }

    pub async fn overdue_ids(&self) -> Result<Vec<String>, KitchenError> {
        Ok(self.kv.set_members(keys::ORDER_OVERDUE).await?)
    }

    /// Pending and Processing orders.
    pub async fn list_active(&self) -> Result<Vec<Order>, KitchenError> {
        let mut orders = self.list_by_status(OrderStatus::Pending).await?;
        orders.extend(self.list_by_status(OrderStatus::Processing).await?);
        Ok(orders)
    }

    /// Scan for orders whose required stations include `station`.
    pub async fn list_by_required_station(
        &self,
        station: StationType,
    ) -> Result<Vec<Order>, KitchenError> {
        let orders = self.list_all().await?;
        Ok(orders
            .into_iter()
            .filter(|order| order.required_stations().contains(&station))
            .collect())
    }

    // =========================================================================
    // Analytics (advisory scans)
    // =========================================================================

    /// Stats over completed orders, optionally bounded to a completion window.
    pub async fn completion_stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<CompletionStats, KitchenError> {
        let completed: Vec<Order> = self
            .list_by_status(OrderStatus::Completed)
            .await?
            .into_iter()
            .filter(|order| {
                order.completed_at.is_some_and(|at| {
                    from.is_none_or(|f| at >= f) && to.is_none_or(|t| at <= t)
                })
            })
            .collect();

        if completed.is_empty() {
            return Ok(CompletionStats::default());
        }

        let count = completed.len();
        let total_actual: i64 = completed.iter().map(|o| o.actual_time_secs).sum();
        let on_time = completed
            .iter()
            .filter(|o| o.estimated_time_secs > 0 && o.actual_time_secs <= o.estimated_time_secs)
            .count();

        let mut actual_times: Vec<i64> = completed.iter().map(|o| o.actual_time_secs).collect();
        actual_times.sort_unstable();
        let median_actual_secs = actual_times[actual_times.len() / 2];

        Ok(CompletionStats {
            completed_orders: count,
            average_actual_secs: total_actual as f64 / count as f64,
            median_actual_secs,
            on_time_rate: on_time as f64 / count as f64,
        })
    }

    /// Completed orders per hour over the window, from the creation-day index.
    pub async fn throughput_per_hour(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, KitchenError> {
        if to <= from {
            return Ok(0.0);
        }

        let mut count = 0usize;
        let mut day = from.date_naive();
        let last = to.date_naive();
        while day <= last {
            let ids = self
                .kv
                .zset_range_by_score(
                    &keys::order_by_date(day),
                    from.timestamp() as f64,
                    to.timestamp() as f64,
                )
                .await?;
            count += ids.len();
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        let hours = (to - from).num_seconds() as f64 / 3600.0;
        Ok(count as f64 / hours)
    }
}

/// Aggregate stats over completed orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CompletionStats {
    pub completed_orders: usize,
    pub average_actual_secs: f64,
    pub median_actual_secs: i64,
    /// Fraction of completed orders whose actual time met the estimate.
    pub on_time_rate: f64,
}
