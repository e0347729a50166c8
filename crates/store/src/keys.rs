//! Key layout of the kitchen store.
//!
//! Everything lives under the `kitchen:` prefix. Entities are stored as JSON
//! strings; index memberships are sets, creation-day indexes are sorted sets
//! scored by unix seconds.

use chrono::NaiveDate;
use common::{EquipmentStatus, OrderPriority, OrderStatus, StationType};

// =============================================================================
// Orders
// =============================================================================

pub const ORDER_ALL: &str = "kitchen:order:all";
pub const ORDER_OVERDUE: &str = "kitchen:order:overdue";

pub fn order(id: &str) -> String {
    format!("kitchen:order:{id}")
}

pub fn order_by_status(status: OrderStatus) -> String {
    format!("kitchen:order:by_status:{}", status.as_str())
}

pub fn order_by_priority(priority: OrderPriority) -> String {
    format!("kitchen:order:by_priority:{}", priority.as_str())
}

pub fn order_by_customer(customer_id: &str) -> String {
    format!("kitchen:order:by_customer:{customer_id}")
}

pub fn order_by_staff(staff_id: &str) -> String {
    format!("kitchen:order:by_staff:{staff_id}")
}

pub fn order_by_date(date: NaiveDate) -> String {
    format!("kitchen:order:by_date:{}", date.format("%Y-%m-%d"))
}

// =============================================================================
// Equipment
// =============================================================================

pub const EQUIPMENT_ALL: &str = "kitchen:equipment:all";

pub fn equipment(id: &str) -> String {
    format!("kitchen:equipment:{id}")
}

pub fn equipment_by_type(station: StationType) -> String {
    format!("kitchen:equipment:by_type:{}", station.as_str())
}

pub fn equipment_by_status(status: EquipmentStatus) -> String {
    format!("kitchen:equipment:by_status:{}", status.as_str())
}

// =============================================================================
// Staff
// =============================================================================

pub const STAFF_ALL: &str = "kitchen:staff:all";
pub const STAFF_AVAILABLE: &str = "kitchen:staff:available";

pub fn staff(id: &str) -> String {
    format!("kitchen:staff:{id}")
}

pub fn staff_by_specialization(station: StationType) -> String {
    format!("kitchen:staff:by_specialization:{}", station.as_str())
}

// =============================================================================
// Queue
// =============================================================================

pub const QUEUE: &str = "kitchen:queue";
pub const QUEUE_STATUS: &str = "kitchen:queue:status";
pub const QUEUE_HISTORY: &str = "kitchen:queue:history";

pub fn workflow(order_id: &str) -> String {
    format!("kitchen:workflow:{order_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(order("o1"), "kitchen:order:o1");
        assert_eq!(
            order_by_status(OrderStatus::Pending),
            "kitchen:order:by_status:pending"
        );
        assert_eq!(
            order_by_priority(OrderPriority::Urgent),
            "kitchen:order:by_priority:urgent"
        );
        assert_eq!(
            order_by_date(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()),
            "kitchen:order:by_date:2025-03-09"
        );
        assert_eq!(
            equipment_by_type(StationType::Espresso),
            "kitchen:equipment:by_type:espresso"
        );
        assert_eq!(
            staff_by_specialization(StationType::Grinder),
            "kitchen:staff:by_specialization:grinder"
        );
    }
}
