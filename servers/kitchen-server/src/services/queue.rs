//! In-memory order queue.
//!
//! Canonical order: priority descending, then created_at ascending. The queue
//! is a projection of the store and is rebuilt from it on startup; it holds
//! Pending and Processing orders and sheds them on terminal transitions.

use chrono::{DateTime, Utc};
use common::{KitchenError, OrderPriority, OrderStatus, StationType};
use store::models::Order;
use store::repositories::QueueStatus;

/// Fallback preparation estimate for wait-time math when an order has none.
const DEFAULT_ESTIMATE_SECS: i64 = 300;

/// Priority+FIFO queue over shared order snapshots.
#[derive(Debug, Default)]
pub struct OrderQueue {
    orders: Vec<Order>,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn resort(&mut self) {
        // Stable sort keeps insertion order for fully tied entries.
        self.orders.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.orders.iter().position(|order| order.id == id)
    }

    /// Insert a Pending order and re-sort.
    pub fn add(&mut self, order: Order) -> Result<(), KitchenError> {
        if order.status != OrderStatus::Pending {
            return Err(KitchenError::InvalidInput(format!(
                "order {} is {} and cannot be queued",
                order.id, order.status
            )));
        }
        if self.position(&order.id).is_some() {
            return Err(KitchenError::Conflict(format!(
                "order {} is already queued",
                order.id
            )));
        }

        self.orders.push(order);
        self.resort();
        Ok(())
    }

    /// Remove an order by id.
    pub fn remove(&mut self, id: &str) -> Result<Order, KitchenError> {
        match self.position(id) {
            Some(index) => Ok(self.orders.remove(index)),
            None => Err(KitchenError::NotFound(format!("order {id} is not queued"))),
        }
    }

    /// The first Pending order that is ready to start, skipping the rest.
    pub fn next(&self) -> Option<Order> {
        self.orders
            .iter()
            .find(|order| order.is_ready_to_start())
            .cloned()
    }

    /// Change an entry's priority and re-sort.
    pub fn update_priority(
        &mut self,
        id: &str,
        priority: OrderPriority,
    ) -> Result<(), KitchenError> {
        let index = self
            .position(id)
            .ok_or_else(|| KitchenError::NotFound(format!("order {id} is not queued")))?;
        self.orders[index].set_priority(priority)?;
        self.resort();
        Ok(())
    }

    /// Replace a queued entry with a fresh snapshot; no-op when absent.
    pub fn sync(&mut self, order: Order) -> bool {
        match self.position(&order.id) {
            Some(index) => {
                self.orders[index] = order;
                self.resort();
                true
            }
            None => false,
        }
    }

    /// Rebuild from store contents (Pending and Processing orders).
    pub fn restore(&mut self, orders: Vec<Order>) {
        self.orders = orders
            .into_iter()
            .filter(|order| !order.status.is_terminal())
            .collect();
        self.resort();
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.iter().find(|order| order.id == id).cloned()
    }

    // =========================================================================
    // Snapshot scans
    // =========================================================================

    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.orders.iter().map(|order| order.id.clone()).collect()
    }

    pub fn by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|order| order.status == status)
            .cloned()
            .collect()
    }

    pub fn by_priority(&self, priority: OrderPriority) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|order| order.priority == priority)
            .cloned()
            .collect()
    }

    pub fn by_station(&self, station: StationType) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|order| order.required_stations().contains(&station))
            .cloned()
            .collect()
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|order| order.is_overdue(now))
            .cloned()
            .collect()
    }

    /// Estimated wait before `new_order` would start: the summed estimates of
    /// every queued order at its priority or higher.
    pub fn estimated_wait_secs(&self, new_order: &Order) -> i64 {
        self.orders
            .iter()
            .filter(|order| {
                order.priority >= new_order.priority
                    && matches!(
                        order.status,
                        OrderStatus::Pending | OrderStatus::Processing
                    )
            })
            .map(|order| {
                if order.estimated_time_secs > 0 {
                    order.estimated_time_secs
                } else {
                    DEFAULT_ESTIMATE_SECS
                }
            })
            .sum()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Recompute the derived status from current contents.
    pub fn status(&self, now: DateTime<Utc>) -> QueueStatus {
        let mut status = QueueStatus {
            total_orders: self.orders.len(),
            generated_at: now,
            ..Default::default()
        };

        let mut pending_wait_total = 0i64;
        for order in &self.orders {
            match order.status {
                OrderStatus::Pending => {
                    status.pending_orders += 1;
                    pending_wait_total += order.wait_time_secs(now);
                }
                OrderStatus::Processing => status.processing_orders += 1,
                _ => {}
            }

            *status.by_priority.entry(order.priority).or_insert(0) += 1;

            if !order.status.is_terminal() {
                for station in order.required_stations() {
                    *status.station_load.entry(station).or_insert(0) += order.total_quantity();
                }
            }

            if order.is_overdue(now) {
                status.overdue_orders += 1;
            }
        }

        if status.pending_orders > 0 {
            status.average_wait_secs = pending_wait_total as f64 / status.pending_orders as f64;
        }
        status
    }
}
