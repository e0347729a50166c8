//! Order and order-item entities, the heart of the status machine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use common::{KitchenError, OrderPriority, OrderStatus, StationType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single beverage line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub instructions: String,
    pub requirements: BTreeSet<StationType>,
    pub metadata: BTreeMap<String, String>,
}

impl OrderItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        instructions: impl Into<String>,
        requirements: BTreeSet<StationType>,
    ) -> Result<Self, KitchenError> {
        let id = id.into();
        let name = name.into();

        if id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("item id is empty".into()));
        }
        if name.trim().is_empty() {
            return Err(KitchenError::InvalidInput("item name is empty".into()));
        }
        if quantity == 0 {
            return Err(KitchenError::InvalidInput(
                "item quantity must be positive".into(),
            ));
        }
        if requirements.is_empty() {
            return Err(KitchenError::InvalidInput(format!(
                "item {id} requires at least one station"
            )));
        }

        Ok(Self {
            id,
            name,
            quantity,
            instructions: instructions.into(),
            requirements,
            metadata: BTreeMap::new(),
        })
    }
}

/// A customer order moving through the kitchen.
///
/// `started_at` is set iff the order ever entered Processing; `completed_at`
/// iff it reached Completed, at which point `actual_time_secs` is fixed to
/// `completed_at - started_at`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub priority: OrderPriority,
    pub estimated_time_secs: i64,
    pub actual_time_secs: i64,
    pub assigned_staff_id: Option<String>,
    pub assigned_equipment: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        items: Vec<OrderItem>,
        priority: OrderPriority,
    ) -> Result<Self, KitchenError> {
        let id = id.into();
        let customer_id = customer_id.into();

        if id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("order id is empty".into()));
        }
        if customer_id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("customer id is empty".into()));
        }
        if items.is_empty() {
            return Err(KitchenError::InvalidInput(
                "order needs at least one item".into(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            customer_id,
            items,
            status: OrderStatus::Pending,
            priority,
            estimated_time_secs: 0,
            actual_time_secs: 0,
            assigned_staff_id: None,
            assigned_equipment: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // =========================================================================
    // Derived properties
    // =========================================================================

    /// Union of the items' required stations.
    pub fn required_stations(&self) -> BTreeSet<StationType> {
        self.items
            .iter()
            .flat_map(|item| item.requirements.iter().copied())
            .collect()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Seconds from creation until the order started, or until `now`.
    pub fn wait_time_secs(&self, now: DateTime<Utc>) -> i64 {
        let until = self.started_at.unwrap_or(now);
        (until - self.created_at).num_seconds().max(0)
    }

    /// Seconds spent processing so far, `None` when never started.
    pub fn processing_time_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        let started = self.started_at?;
        let until = self.completed_at.unwrap_or(now);
        Some((until - started).num_seconds().max(0))
    }

    /// Started, not yet completed, and past its estimate.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if self.estimated_time_secs <= 0 || self.status == OrderStatus::Completed {
            return false;
        }
        match self.started_at {
            Some(started) => now > started + chrono::Duration::seconds(self.estimated_time_secs),
            None => false,
        }
    }

    /// Seconds past the estimate; zero when not overdue.
    pub fn overdue_by_secs(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_overdue(now) {
            return 0;
        }
        match self.started_at {
            Some(started) => {
                (now - started).num_seconds() - self.estimated_time_secs
            }
            None => 0,
        }
    }

    /// Pending with both staff and equipment assigned.
    pub fn is_ready_to_start(&self) -> bool {
        self.status == OrderStatus::Pending
            && self.assigned_staff_id.is_some()
            && !self.assigned_equipment.is_empty()
    }

    // =========================================================================
    // Guarded transitions
    // =========================================================================

    /// Apply a status transition, stamping `started_at`/`completed_at`.
    pub fn update_status(&mut self, next: OrderStatus) -> Result<(), KitchenError> {
        if !self.status.can_transition_to(next) {
            return Err(KitchenError::InvalidState(format!(
                "order {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }

        let now = Utc::now();
        if next == OrderStatus::Processing {
            self.started_at = Some(now);
        }
        if next == OrderStatus::Completed {
            self.completed_at = Some(now);
            if let Some(started) = self.started_at {
                self.actual_time_secs = (now - started).num_seconds().max(0);
            }
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Change the priority bucket; terminal orders are immutable.
    pub fn set_priority(&mut self, priority: OrderPriority) -> Result<(), KitchenError> {
        if self.status.is_terminal() {
            return Err(KitchenError::InvalidState(format!(
                "order {} is {} and cannot be reprioritized",
                self.id, self.status
            )));
        }
        self.priority = priority;
        self.touch();
        Ok(())
    }

    /// Bind the order to a staff member; only Pending orders accept it.
    pub fn assign_staff(&mut self, staff_id: impl Into<String>) -> Result<(), KitchenError> {
        if self.status != OrderStatus::Pending {
            return Err(KitchenError::InvalidState(format!(
                "order {} is {} and cannot be assigned",
                self.id, self.status
            )));
        }
        self.assigned_staff_id = Some(staff_id.into());
        self.touch();
        Ok(())
    }

    /// Record a piece of equipment working this order.
    pub fn assign_equipment(&mut self, equipment_id: impl Into<String>) -> Result<(), KitchenError> {
        if self.status.is_terminal() {
            return Err(KitchenError::InvalidState(format!(
                "order {} is {} and cannot take equipment",
                self.id, self.status
            )));
        }
        let equipment_id = equipment_id.into();
        if !self.assigned_equipment.contains(&equipment_id) {
            self.assigned_equipment.push(equipment_id);
        }
        self.touch();
        Ok(())
    }

    pub fn set_estimated_time(&mut self, secs: i64) -> Result<(), KitchenError> {
        if secs < 0 {
            return Err(KitchenError::InvalidInput(
                "estimated time must be non-negative".into(),
            ));
        }
        self.estimated_time_secs = secs;
        self.touch();
        Ok(())
    }
}

/// Request item inside [`CreateOrder`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderItem {
    pub id: Option<String>,
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub instructions: String,
    pub requirements: BTreeSet<StationType>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Request to add an order to the queue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrder {
    pub id: Option<String>,
    pub customer_id: String,
    pub items: Vec<CreateOrderItem>,
    pub priority: Option<OrderPriority>,
}
