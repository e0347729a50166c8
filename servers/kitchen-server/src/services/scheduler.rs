//! Scheduler service: the coordinator behind every public operation.
//!
//! Write path per operation: take the aggregate's writer lock, load and
//! mutate the entity, persist it with its indexes, release, mirror the change
//! into the in-memory queue under the queue lock, then publish events with no
//! lock held. Multi-aggregate operations commit one side at a time and lean
//! on the reconciliation pass when the second write fails.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{
    EquipmentStatus, KitchenError, KitchenEvent, OrderPriority, OrderStatus,
};
use serde::{Deserialize, Serialize};
use store::models::{
    CreateEquipment, CreateOrder, CreateStaff, Equipment, EquipmentQuery, Order, OrderItem, Staff,
    StaffQuery, WorkflowOptimization,
};
use store::repositories::{
    CompletionStats, EquipmentRepository, OrderRepository, QueueRepository, QueueStatus,
    StaffRepository,
};
use store::KvHandle;
use tokio::sync::{Mutex, RwLock};
use utoipa::ToSchema;
use uuid::Uuid;

use super::event_bus::EventBus;
use super::optimizer;
use super::queue::OrderQueue;

/// Pending orders waiting longer than this are promoted one bucket.
const STARVATION_SECS: i64 = 15 * 60;

/// Queue status with the overdue set and the next ready candidate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueOverview {
    pub status: QueueStatus,
    pub overdue_orders: Vec<Order>,
    pub next_order: Option<Order>,
}

/// Point-in-time kitchen health numbers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KitchenMetrics {
    pub queue: QueueStatus,
    /// Mean staff workload in [0, 1].
    pub staff_utilization: f64,
    /// Mean equipment load over capacity in [0, 1].
    pub equipment_utilization: f64,
    pub completion: CompletionStats,
    pub recommendations: Vec<String>,
}

/// Aggregates over a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PerformanceReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub completion: CompletionStats,
    pub throughput_per_hour: f64,
    pub history_points: usize,
}

/// Use-case coordinator over the store, the queue projection and the bus.
pub struct KitchenService {
    orders: OrderRepository,
    equipment: EquipmentRepository,
    staff: StaffRepository,
    queue_repo: QueueRepository,
    queue: RwLock<OrderQueue>,
    bus: Arc<EventBus>,
    // Single logical writer per aggregate type.
    order_write: Mutex<()>,
    equipment_write: Mutex<()>,
    staff_write: Mutex<()>,
    // Orders already announced as overdue in their current episode.
    notified_overdue: std::sync::Mutex<HashSet<String>>,
}

impl KitchenService {
    pub fn new(kv: KvHandle, bus: Arc<EventBus>) -> Self {
        Self {
            orders: OrderRepository::new(kv.clone()),
            equipment: EquipmentRepository::new(kv.clone()),
            staff: StaffRepository::new(kv.clone()),
            queue_repo: QueueRepository::new(kv),
            queue: RwLock::new(OrderQueue::new()),
            bus,
            order_write: Mutex::new(()),
            equipment_write: Mutex::new(()),
            staff_write: Mutex::new(()),
            notified_overdue: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Rebuild the queue projection from the store.
    ///
    /// The persisted id sequence is the primary source; active orders missing
    /// from it (a crash between the store write and the queue persist) are
    /// folded back in.
    pub async fn restore_queue(&self) -> Result<usize, KitchenError> {
        let ids = self.queue_repo.load_ids().await?;
        let mut restored: Vec<Order> = Vec::with_capacity(ids.len());
        for id in ids {
            match self.orders.get(&id).await {
                Ok(order) => restored.push(order),
                Err(KitchenError::NotFound(_)) => {
                    tracing::warn!(order_id = %id, "queued id without a stored order, skipping");
                }
                Err(err) => return Err(err),
            }
        }
        for order in self.orders.list_active().await? {
            if !restored.iter().any(|known| known.id == order.id) {
                restored.push(order);
            }
        }

        let count = {
            let mut queue = self.queue.write().await;
            queue.restore(restored);
            queue.len()
        };
        self.persist_queue().await;
        tracing::info!(orders = count, "queue restored from store");
        Ok(count)
    }

    /// Write the queue id sequence back to the store; the projection is
    /// rebuildable, so failures only log.
    async fn persist_queue(&self) {
        let ids = { self.queue.read().await.ids() };
        if let Err(err) = self.queue_repo.save_ids(&ids).await {
            tracing::warn!(error = %err, "failed to persist queue sequence");
        }
    }

    async fn publish_queue_changed(&self) {
        let (total, pending) = {
            let queue = self.queue.read().await;
            let status = queue.status(Utc::now());
            (status.total_orders, status.pending_orders)
        };
        self.bus
            .publish(KitchenEvent::queue_status_changed(total, pending))
            .await;
    }

    fn forget_overdue(&self, order_id: &str) {
        self.notified_overdue
            .lock()
            .expect("overdue set poisoned")
            .remove(order_id);
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Build, persist and enqueue a new order.
    pub async fn add_order(&self, request: CreateOrder) -> Result<Order, KitchenError> {
        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let mut built = OrderItem::new(
                item.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                item.name,
                item.quantity,
                item.instructions,
                item.requirements,
            )?;
            built.metadata = item.metadata;
            items.push(built);
        }

        let mut order = Order::new(
            request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request.customer_id,
            items,
            request.priority.unwrap_or(OrderPriority::Normal),
        )?;
        order.set_estimated_time(optimizer::predict_preparation_time(&order))?;

        {
            let _guard = self.order_write.lock().await;
            self.orders.create(&order).await?;
        }

        // The store write stands even when the queue insert fails; the next
        // restore folds the order back in.
        let inserted = {
            let mut queue = self.queue.write().await;
            queue.add(order.clone())
        };
        inserted?;
        self.persist_queue().await;

        self.bus
            .publish(KitchenEvent::order_added_to_queue(
                &order.id,
                &order.customer_id,
                order.priority.as_str(),
            ))
            .await;
        self.publish_queue_changed().await;

        tracing::info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            priority = %order.priority,
            estimated_secs = order.estimated_time_secs,
            "order added to queue"
        );
        Ok(order)
    }

    pub async fn get_order(&self, id: &str) -> Result<Order, KitchenError> {
        self.orders.get(id).await
    }

    /// Guarded status transition plus its side effects.
    async fn apply_status(
        &self,
        id: &str,
        next: OrderStatus,
    ) -> Result<Order, KitchenError> {
        let (order, old) = {
            let _guard = self.order_write.lock().await;
            let mut order = self.orders.get(id).await?;
            let old = order.status;
            order.update_status(next)?;
            self.orders.update(&order).await?;
            (order, old)
        };

        {
            let mut queue = self.queue.write().await;
            if next.is_terminal() {
                let _ = queue.remove(id);
            } else {
                queue.sync(order.clone());
            }
        }
        self.persist_queue().await;

        self.bus
            .publish(KitchenEvent::order_status_changed(
                id,
                old.as_str(),
                next.as_str(),
            ))
            .await;
        match next {
            OrderStatus::Processing => {
                self.bus.publish(KitchenEvent::order_started(id)).await;
            }
            OrderStatus::Completed => {
                self.bus
                    .publish(KitchenEvent::order_completed(id, order.actual_time_secs))
                    .await;
                self.forget_overdue(id);
                self.release_staff(&order).await?;
                self.release_equipment(&order).await;
            }
            OrderStatus::Cancelled => {
                self.bus.publish(KitchenEvent::order_cancelled(id)).await;
                self.forget_overdue(id);
                self.release_equipment(&order).await;
            }
            OrderStatus::Pending => {}
        }
        if next.is_terminal() {
            self.publish_queue_changed().await;
        }

        Ok(order)
    }

    pub async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<Order, KitchenError> {
        self.apply_status(id, status).await
    }

    /// Requires the order to be ready: Pending with staff and equipment bound.
    pub async fn start_order(&self, id: &str) -> Result<Order, KitchenError> {
        let order = self.orders.get(id).await?;
        if !order.is_ready_to_start() {
            return Err(KitchenError::InvalidState(format!(
                "order {id} is not ready to start"
            )));
        }
        self.apply_status(id, OrderStatus::Processing).await
    }

    /// Requires the order to be Processing.
    pub async fn complete_order(&self, id: &str) -> Result<Order, KitchenError> {
        let order = self.orders.get(id).await?;
        if order.status != OrderStatus::Processing {
            return Err(KitchenError::InvalidState(format!(
                "order {id} is {} and cannot be completed",
                order.status
            )));
        }
        self.apply_status(id, OrderStatus::Completed).await
    }

    pub async fn update_order_priority(
        &self,
        id: &str,
        priority: OrderPriority,
    ) -> Result<Order, KitchenError> {
        let order = {
            let _guard = self.order_write.lock().await;
            let mut order = self.orders.get(id).await?;
            order.set_priority(priority)?;
            self.orders.update(&order).await?;
            order
        };

        {
            let mut queue = self.queue.write().await;
            queue.sync(order.clone());
        }
        self.persist_queue().await;

        self.bus
            .publish(KitchenEvent::order_priority_changed(id, priority.as_str()))
            .await;
        Ok(order)
    }

    /// Bind an order to a staff member and to available equipment.
    ///
    /// The staff counter commits first; if the order write then fails the
    /// error is surfaced and the reconciliation pass restores the counter.
    pub async fn assign_order_to_staff(
        &self,
        order_id: &str,
        staff_id: &str,
    ) -> Result<Order, KitchenError> {
        let mut events: Vec<KitchenEvent> = Vec::new();

        let order = {
            let _order_guard = self.order_write.lock().await;
            let mut order = self.orders.get(order_id).await?;
            if order.status != OrderStatus::Pending {
                return Err(KitchenError::InvalidState(format!(
                    "order {order_id} is {} and cannot be assigned",
                    order.status
                )));
            }
            let required = order.required_stations();

            {
                let _staff_guard = self.staff_write.lock().await;
                let mut staff = self.staff.get(staff_id).await?;
                staff.assign_order(&required)?;
                self.staff.update(&staff).await?;
                if staff.is_overloaded() {
                    events.push(KitchenEvent::staff_overloaded(
                        staff_id,
                        staff.current_orders,
                        staff.max_concurrent,
                    ));
                }
            }

            order.assign_staff(staff_id)?;

            // Bind one available unit per required station; stations with no
            // free unit are skipped and the order simply stays not-ready.
            for station in required {
                let _equipment_guard = self.equipment_write.lock().await;
                let units = self.equipment.list_by_type(station).await?;
                let Some(mut unit) = units.into_iter().find(|unit| {
                    unit.status == EquipmentStatus::Available && !unit.is_at_capacity()
                }) else {
                    continue;
                };
                unit.add_load(1)?;
                self.equipment.update(&unit).await?;
                order.assign_equipment(&unit.id)?;
                if unit.is_at_capacity() {
                    events.push(KitchenEvent::equipment_overloaded(
                        &unit.id,
                        unit.current_load,
                        unit.max_capacity,
                    ));
                }
            }

            self.orders.update(&order).await?;
            order
        };

        {
            let mut queue = self.queue.write().await;
            queue.sync(order.clone());
        }
        self.persist_queue().await;

        self.bus
            .publish(KitchenEvent::order_assigned(order_id, staff_id))
            .await;
        self.bus
            .publish(KitchenEvent::staff_assigned(staff_id, order_id))
            .await;
        for event in events {
            self.bus.publish(event).await;
        }

        tracing::info!(order_id = %order_id, staff_id = %staff_id, "order assigned");
        Ok(order)
    }

    /// Decrement the assigned staff member's counter after completion.
    async fn release_staff(&self, order: &Order) -> Result<(), KitchenError> {
        let Some(staff_id) = &order.assigned_staff_id else {
            return Ok(());
        };

        let _guard = self.staff_write.lock().await;
        let mut staff = self.staff.get(staff_id).await?;
        match staff.complete_order() {
            Ok(()) => self.staff.update(&staff).await,
            Err(err) => {
                // Counter already at zero; reconciliation owns the repair.
                tracing::warn!(staff_id = %staff_id, error = %err, "staff release skipped");
                Ok(())
            }
        }
    }

    /// Give back one unit of load per bound equipment; best-effort.
    async fn release_equipment(&self, order: &Order) {
        for equipment_id in &order.assigned_equipment {
            let _guard = self.equipment_write.lock().await;
            match self.equipment.get(equipment_id).await {
                Ok(mut unit) if unit.current_load > 0 => {
                    if unit.remove_load(1).is_ok() {
                        if let Err(err) = self.equipment.update(&unit).await {
                            tracing::warn!(
                                equipment_id = %equipment_id,
                                error = %err,
                                "failed to persist equipment release"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(equipment_id = %equipment_id, error = %err, "equipment release failed");
                }
            }
        }
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Derived status, overdue set and next candidate; also the read-side
    /// overdue sweep.
    pub async fn queue_overview(&self) -> Result<QueueOverview, KitchenError> {
        let now = Utc::now();
        let (status, overdue_orders, next_order) = {
            let queue = self.queue.read().await;
            (queue.status(now), queue.overdue(now), queue.next())
        };

        if let Err(err) = self.queue_repo.cache_status(&status).await {
            tracing::warn!(error = %err, "failed to cache queue status");
        }
        if let Err(err) = self.queue_repo.append_history(&status).await {
            tracing::warn!(error = %err, "failed to append queue history");
        }

        self.notify_overdue(&overdue_orders, now).await;

        Ok(QueueOverview {
            status,
            overdue_orders,
            next_order,
        })
    }

    pub async fn next_order(&self) -> Option<Order> {
        self.queue.read().await.next()
    }

    /// Run the workflow planner over the queue and persist the plan.
    pub async fn optimize_queue(&self) -> Result<WorkflowOptimization, KitchenError> {
        let snapshot = { self.queue.read().await.snapshot() };
        let plan = optimizer::optimize_workflow(&snapshot).ok_or_else(|| {
            KitchenError::InvalidState("queue is empty, nothing to optimize".into())
        })?;

        self.queue_repo.save_optimization(&plan).await?;
        self.bus
            .publish(KitchenEvent::workflow_optimized(
                &plan.order_id,
                plan.efficiency_gain_pct,
            ))
            .await;
        Ok(plan)
    }

    /// Emit `order.overdue` once per overdue episode and keep the store's
    /// overdue set in sync. Returns how many events were emitted.
    async fn notify_overdue(&self, overdue: &[Order], now: DateTime<Utc>) -> u64 {
        let mut emitted = 0;
        for order in overdue {
            if let Err(err) = self.orders.sync_overdue(order, now).await {
                tracing::warn!(order_id = %order.id, error = %err, "overdue sync failed");
            }

            let first_notice = self
                .notified_overdue
                .lock()
                .expect("overdue set poisoned")
                .insert(order.id.clone());
            if first_notice {
                self.bus
                    .publish(KitchenEvent::order_overdue(
                        &order.id,
                        order.overdue_by_secs(now),
                    ))
                    .await;
                emitted += 1;
            }
        }
        emitted
    }

    /// Timer-driven overdue sweep.
    pub async fn sweep_overdue(&self) -> Result<u64, KitchenError> {
        let now = Utc::now();
        let overdue = { self.queue.read().await.overdue(now) };
        Ok(self.notify_overdue(&overdue, now).await)
    }

    /// Promote starving Pending orders one bucket, clamped at Urgent.
    ///
    /// `updated_at` doubles as the anti-thrash marker: a just-promoted order
    /// is not promoted again until another full threshold passes.
    pub async fn rebalance_queue(&self) -> Result<u64, KitchenError> {
        let now = Utc::now();
        let starving: Vec<Order> = {
            let queue = self.queue.read().await;
            queue
                .snapshot()
                .into_iter()
                .filter(|order| {
                    order.status == OrderStatus::Pending
                        && order.priority < OrderPriority::Urgent
                        && order.wait_time_secs(now) > STARVATION_SECS
                        && (now - order.updated_at).num_seconds() > STARVATION_SECS
                })
                .collect()
        };

        let mut promoted = 0;
        for order in starving {
            let next = order.priority.promoted();
            match self.update_order_priority(&order.id, next).await {
                Ok(_) => {
                    promoted += 1;
                    tracing::info!(
                        order_id = %order.id,
                        new_priority = %next,
                        "starving order promoted"
                    );
                }
                Err(err) => {
                    tracing::warn!(order_id = %order.id, error = %err, "promotion failed");
                }
            }
        }
        Ok(promoted)
    }

    /// Restore staff counters from the by-staff index.
    pub async fn reconcile_staff_counters(&self) -> Result<u64, KitchenError> {
        let mut repaired = 0;
        for mut staff in self.staff.list_all().await? {
            let active = self
                .orders
                .list_by_staff(&staff.id)
                .await?
                .into_iter()
                .filter(|order| {
                    matches!(order.status, OrderStatus::Pending | OrderStatus::Processing)
                })
                .count() as u32;

            if active != staff.current_orders {
                let _guard = self.staff_write.lock().await;
                tracing::info!(
                    staff_id = %staff.id,
                    counted = staff.current_orders,
                    actual = active,
                    "reconciling staff counter"
                );
                staff.current_orders = active.min(staff.max_concurrent);
                self.staff.update(&staff).await?;
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    // =========================================================================
    // Equipment
    // =========================================================================

    pub async fn create_equipment(
        &self,
        request: CreateEquipment,
    ) -> Result<Equipment, KitchenError> {
        let equipment = Equipment::new(
            request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request.name,
            request.station_type,
            request.max_capacity,
            request.efficiency_score.unwrap_or(5.0),
        )?;

        let _guard = self.equipment_write.lock().await;
        self.equipment.create(&equipment).await?;
        tracing::info!(equipment_id = %equipment.id, station = %equipment.station_type, "equipment created");
        Ok(equipment)
    }

    pub async fn get_equipment(&self, id: &str) -> Result<Equipment, KitchenError> {
        self.equipment.get(id).await
    }

    pub async fn list_equipment(
        &self,
        query: &EquipmentQuery,
    ) -> Result<Vec<Equipment>, KitchenError> {
        self.equipment.list(query).await
    }

    pub async fn update_equipment_status(
        &self,
        id: &str,
        status: EquipmentStatus,
    ) -> Result<Equipment, KitchenError> {
        let (equipment, old) = {
            let _guard = self.equipment_write.lock().await;
            let mut equipment = self.equipment.get(id).await?;
            let old = equipment.status;
            equipment.update_status(status)?;
            self.equipment.update(&equipment).await?;
            (equipment, old)
        };

        self.bus
            .publish(KitchenEvent::equipment_status_changed(
                id,
                old.as_str(),
                status.as_str(),
            ))
            .await;
        Ok(equipment)
    }

    pub async fn schedule_equipment_maintenance(
        &self,
        id: &str,
    ) -> Result<Equipment, KitchenError> {
        let equipment = {
            let _guard = self.equipment_write.lock().await;
            let mut equipment = self.equipment.get(id).await?;
            equipment.schedule_maintenance()?;
            self.equipment.update(&equipment).await?;
            equipment
        };

        self.bus
            .publish(KitchenEvent::equipment_maintenance_scheduled(id))
            .await;
        Ok(equipment)
    }

    // =========================================================================
    // Staff
    // =========================================================================

    pub async fn create_staff(&self, request: CreateStaff) -> Result<Staff, KitchenError> {
        let staff = Staff::new(
            request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request.name,
            request.specializations,
            request.skill_level,
            request.max_concurrent,
        )?;

        let _guard = self.staff_write.lock().await;
        self.staff.create(&staff).await?;
        tracing::info!(staff_id = %staff.id, "staff created");
        Ok(staff)
    }

    pub async fn get_staff(&self, id: &str) -> Result<Staff, KitchenError> {
        self.staff.get(id).await
    }

    pub async fn list_staff(&self, query: &StaffQuery) -> Result<Vec<Staff>, KitchenError> {
        self.staff.list(query).await
    }

    pub async fn update_staff_availability(
        &self,
        id: &str,
        is_available: bool,
    ) -> Result<Staff, KitchenError> {
        let staff = {
            let _guard = self.staff_write.lock().await;
            let mut staff = self.staff.get(id).await?;
            staff.update_availability(is_available);
            self.staff.update(&staff).await?;
            staff
        };

        self.bus
            .publish(KitchenEvent::staff_availability_changed(id, is_available))
            .await;
        Ok(staff)
    }

    pub async fn update_staff_skill(
        &self,
        id: &str,
        skill_level: f64,
    ) -> Result<Staff, KitchenError> {
        let staff = {
            let _guard = self.staff_write.lock().await;
            let mut staff = self.staff.get(id).await?;
            staff.update_skill(skill_level)?;
            self.staff.update(&staff).await?;
            staff
        };

        self.bus
            .publish(KitchenEvent::staff_skill_updated(id, skill_level))
            .await;
        Ok(staff)
    }

    // =========================================================================
    // Analytics
    // =========================================================================

    pub async fn kitchen_metrics(&self) -> Result<KitchenMetrics, KitchenError> {
        let now = Utc::now();
        let queue = { self.queue.read().await.status(now) };
        let staff = self.staff.list_all().await?;
        let equipment = self.equipment.list_all().await?;
        let orders = { self.queue.read().await.snapshot() };

        let staff_utilization = if staff.is_empty() {
            0.0
        } else {
            staff.iter().map(Staff::workload).sum::<f64>() / staff.len() as f64
        };
        let equipment_utilization = if equipment.is_empty() {
            0.0
        } else {
            equipment
                .iter()
                .map(|unit| f64::from(unit.current_load) / f64::from(unit.max_capacity))
                .sum::<f64>()
                / equipment.len() as f64
        };

        Ok(KitchenMetrics {
            queue,
            staff_utilization,
            equipment_utilization,
            completion: self.orders.completion_stats(None, None).await?,
            recommendations: optimizer::generate_recommendations(&orders, &equipment, &staff),
        })
    }

    pub async fn performance_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<PerformanceReport, KitchenError> {
        let to = to.unwrap_or_else(Utc::now);
        let from = from.unwrap_or(to - Duration::hours(24));
        if from >= to {
            return Err(KitchenError::InvalidInput(
                "report period start must precede its end".into(),
            ));
        }

        Ok(PerformanceReport {
            from,
            to,
            completion: self.orders.completion_stats(Some(from), Some(to)).await?,
            throughput_per_hour: self.orders.throughput_per_hour(from, to).await?,
            history_points: self.queue_repo.history_range(from, to).await?.len(),
        })
    }
}

#[async_trait::async_trait]
impl bridge::SchedulerApi for KitchenService {
    async fn add_order(&self, request: CreateOrder) -> Result<Order, KitchenError> {
        KitchenService::add_order(self, request).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), KitchenError> {
        self.update_order_status(order_id, OrderStatus::Cancelled)
            .await
            .map(|_| ())
    }

    async fn start_order(&self, order_id: &str) -> Result<(), KitchenError> {
        KitchenService::start_order(self, order_id).await.map(|_| ())
    }

    async fn reprioritize(
        &self,
        order_id: &str,
        priority: OrderPriority,
    ) -> Result<(), KitchenError> {
        self.update_order_priority(order_id, priority)
            .await
            .map(|_| ())
    }

    async fn active_order_ids(&self) -> Result<Vec<String>, KitchenError> {
        Ok(self
            .orders
            .list_active()
            .await?
            .into_iter()
            .map(|order| order.id)
            .collect())
    }
}
