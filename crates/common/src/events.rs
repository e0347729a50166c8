//! Domain event envelope and the closed set of kitchen events.
//!
//! The JSON shape of [`KitchenEvent`] is consumed cross-service; field names
//! and the per-type data keys are part of the wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Schema version stamped on every emitted event.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Event type names, dot-separated by aggregate.
pub mod event_types {
    pub const ORDER_ADDED_TO_QUEUE: &str = "kitchen.order.added_to_queue";
    pub const ORDER_STATUS_CHANGED: &str = "kitchen.order.status_changed";
    pub const ORDER_ASSIGNED: &str = "kitchen.order.assigned";
    pub const ORDER_STARTED: &str = "kitchen.order.started";
    pub const ORDER_COMPLETED: &str = "kitchen.order.completed";
    pub const ORDER_CANCELLED: &str = "kitchen.order.cancelled";
    pub const ORDER_OVERDUE: &str = "kitchen.order.overdue";
    pub const ORDER_PRIORITY_CHANGED: &str = "kitchen.order.priority_changed";

    pub const EQUIPMENT_STATUS_CHANGED: &str = "kitchen.equipment.status_changed";
    pub const EQUIPMENT_MAINTENANCE_SCHEDULED: &str = "kitchen.equipment.maintenance_scheduled";
    pub const EQUIPMENT_OVERLOADED: &str = "kitchen.equipment.overloaded";

    pub const STAFF_ASSIGNED: &str = "kitchen.staff.assigned";
    pub const STAFF_AVAILABILITY_CHANGED: &str = "kitchen.staff.availability_changed";
    pub const STAFF_OVERLOADED: &str = "kitchen.staff.overloaded";
    pub const STAFF_SKILL_UPDATED: &str = "kitchen.staff.skill_updated";

    pub const QUEUE_STATUS_CHANGED: &str = "kitchen.queue.status_changed";
    pub const WORKFLOW_OPTIMIZED: &str = "kitchen.workflow.optimized";
}

/// Upstream order-service channels consumed by the inbound bridge.
pub mod channels {
    pub const ORDER_CREATED: &str = "events:order:order.created";
    pub const ORDER_UPDATED: &str = "events:order:order.updated";
    pub const ORDER_CANCELLED: &str = "events:order:order.cancelled";
    pub const ORDER_PAYMENT_CONFIRMED: &str = "events:order:order.payment_confirmed";

    pub const ALL: &[&str] = &[
        ORDER_CREATED,
        ORDER_UPDATED,
        ORDER_CANCELLED,
        ORDER_PAYMENT_CONFIRMED,
    ];
}

/// Domain event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitchenEvent {
    /// Globally unique event id.
    pub id: String,

    /// Dotted event type name.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Id of the aggregate the event belongs to.
    pub aggregate_id: String,

    /// Per-type payload fields.
    pub data: Map<String, Value>,

    /// Emission timestamp (RFC 3339).
    pub occurred_at: DateTime<Utc>,

    /// Envelope schema version.
    pub version: u32,
}

impl KitchenEvent {
    /// Create an event with a fresh id and the current timestamp.
    pub fn new(event_type: &str, aggregate_id: &str, data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            data,
            occurred_at: Utc::now(),
            version: EVENT_SCHEMA_VERSION,
        }
    }

    fn with_data(event_type: &str, aggregate_id: &str, fields: Vec<(&str, Value)>) -> Self {
        let mut data = Map::new();
        for (key, value) in fields {
            data.insert(key.to_string(), value);
        }
        Self::new(event_type, aggregate_id, data)
    }

    // =========================================================================
    // Order events
    // =========================================================================

    pub fn order_added_to_queue(order_id: &str, customer_id: &str, priority: &str) -> Self {
        Self::with_data(
            event_types::ORDER_ADDED_TO_QUEUE,
            order_id,
            vec![
                ("customer_id", json!(customer_id)),
                ("priority", json!(priority)),
            ],
        )
    }

    pub fn order_status_changed(order_id: &str, old_status: &str, new_status: &str) -> Self {
        Self::with_data(
            event_types::ORDER_STATUS_CHANGED,
            order_id,
            vec![
                ("old_status", json!(old_status)),
                ("new_status", json!(new_status)),
            ],
        )
    }

    pub fn order_assigned(order_id: &str, staff_id: &str) -> Self {
        Self::with_data(
            event_types::ORDER_ASSIGNED,
            order_id,
            vec![("staff_id", json!(staff_id))],
        )
    }

    pub fn order_started(order_id: &str) -> Self {
        Self::with_data(event_types::ORDER_STARTED, order_id, vec![])
    }

    pub fn order_completed(order_id: &str, actual_time_secs: i64) -> Self {
        Self::with_data(
            event_types::ORDER_COMPLETED,
            order_id,
            vec![("actual_time", json!(actual_time_secs))],
        )
    }

    pub fn order_cancelled(order_id: &str) -> Self {
        Self::with_data(event_types::ORDER_CANCELLED, order_id, vec![])
    }

    pub fn order_overdue(order_id: &str, overdue_by_secs: i64) -> Self {
        Self::with_data(
            event_types::ORDER_OVERDUE,
            order_id,
            vec![("overdue_by", json!(overdue_by_secs))],
        )
    }

    pub fn order_priority_changed(order_id: &str, new_priority: &str) -> Self {
        Self::with_data(
            event_types::ORDER_PRIORITY_CHANGED,
            order_id,
            vec![("new_priority", json!(new_priority))],
        )
    }

    // =========================================================================
    // Equipment events
    // =========================================================================

    pub fn equipment_status_changed(equipment_id: &str, old_status: &str, new_status: &str) -> Self {
        Self::with_data(
            event_types::EQUIPMENT_STATUS_CHANGED,
            equipment_id,
            vec![
                ("old_status", json!(old_status)),
                ("new_status", json!(new_status)),
            ],
        )
    }

    pub fn equipment_maintenance_scheduled(equipment_id: &str) -> Self {
        Self::with_data(
            event_types::EQUIPMENT_MAINTENANCE_SCHEDULED,
            equipment_id,
            vec![],
        )
    }

    pub fn equipment_overloaded(equipment_id: &str, current_load: u32, max_capacity: u32) -> Self {
        Self::with_data(
            event_types::EQUIPMENT_OVERLOADED,
            equipment_id,
            vec![
                ("current_load", json!(current_load)),
                ("max_capacity", json!(max_capacity)),
            ],
        )
    }

    // =========================================================================
    // Staff events
    // =========================================================================

    pub fn staff_assigned(staff_id: &str, order_id: &str) -> Self {
        Self::with_data(
            event_types::STAFF_ASSIGNED,
            staff_id,
            vec![("order_id", json!(order_id))],
        )
    }

    pub fn staff_availability_changed(staff_id: &str, is_available: bool) -> Self {
        Self::with_data(
            event_types::STAFF_AVAILABILITY_CHANGED,
            staff_id,
            vec![("is_available", json!(is_available))],
        )
    }

    pub fn staff_overloaded(staff_id: &str, current_orders: u32, max_concurrent: u32) -> Self {
        Self::with_data(
            event_types::STAFF_OVERLOADED,
            staff_id,
            vec![
                ("current_orders", json!(current_orders)),
                ("max_concurrent", json!(max_concurrent)),
            ],
        )
    }

    pub fn staff_skill_updated(staff_id: &str, skill_level: f64) -> Self {
        Self::with_data(
            event_types::STAFF_SKILL_UPDATED,
            staff_id,
            vec![("skill_level", json!(skill_level))],
        )
    }

    // =========================================================================
    // Queue / workflow events
    // =========================================================================

    pub fn queue_status_changed(total_orders: usize, pending_orders: usize) -> Self {
        Self::with_data(
            event_types::QUEUE_STATUS_CHANGED,
            "queue",
            vec![
                ("total_orders", json!(total_orders)),
                ("pending_orders", json!(pending_orders)),
            ],
        )
    }

    pub fn workflow_optimized(order_id: &str, efficiency_gain_pct: f64) -> Self {
        Self::with_data(
            event_types::WORKFLOW_OPTIMIZED,
            order_id,
            vec![("efficiency_gain", json!(efficiency_gain_pct))],
        )
    }
}

/// Match an event type against a subscription pattern.
///
/// Patterns are either exact dotted names or a dotted prefix with a trailing
/// `*` segment (`kitchen.order.*`). A bare `*` matches everything.
pub fn matches_pattern(event_type: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix(".*") {
        Some(prefix) => event_type
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => event_type == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_format() {
        let event = KitchenEvent::order_status_changed("o1", "pending", "processing");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "kitchen.order.status_changed");
        assert_eq!(value["aggregate_id"], "o1");
        assert_eq!(value["data"]["old_status"], "pending");
        assert_eq!(value["data"]["new_status"], "processing");
        assert_eq!(value["version"], 1);
        // RFC 3339 timestamp
        assert!(value["occurred_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_completed_event_carries_actual_time() {
        let event = KitchenEvent::order_completed("o1", 95);
        assert_eq!(event.data["actual_time"], json!(95));
    }

    #[test]
    fn test_overdue_event_carries_overdue_by() {
        let event = KitchenEvent::order_overdue("o1", 42);
        assert_eq!(event.data["overdue_by"], json!(42));
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = KitchenEvent::order_started("o1");
        let b = KitchenEvent::order_started("o1");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("kitchen.order.started", "*"));
        assert!(matches_pattern(
            "kitchen.order.started",
            "kitchen.order.started"
        ));
        assert!(matches_pattern("kitchen.order.started", "kitchen.order.*"));
        assert!(matches_pattern("kitchen.order.started", "kitchen.*"));

        assert!(!matches_pattern("kitchen.order.started", "kitchen.staff.*"));
        assert!(!matches_pattern("kitchen.orders", "kitchen.order.*"));
        assert!(!matches_pattern("kitchen.order", "kitchen.order.*"));
    }

    #[test]
    fn test_round_trip_deserialization() {
        let event = KitchenEvent::order_priority_changed("o7", "urgent");
        let text = serde_json::to_string(&event).unwrap();
        let back: KitchenEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.event_type, event.event_type);
        assert_eq!(back.data["new_priority"], "urgent");
    }
}
