//! Closed enumerations of the kitchen domain.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::KitchenError;

/// A class of kitchen workstation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StationType {
    Espresso,
    Grinder,
    Steamer,
    Assembly,
}

impl StationType {
    pub const ALL: &'static [StationType] = &[
        StationType::Espresso,
        StationType::Grinder,
        StationType::Steamer,
        StationType::Assembly,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            StationType::Espresso => "espresso",
            StationType::Grinder => "grinder",
            StationType::Steamer => "steamer",
            StationType::Assembly => "assembly",
        }
    }

    /// Parse a station name, rejecting anything outside the closed set.
    pub fn parse(value: &str) -> Result<Self, KitchenError> {
        match value {
            "espresso" => Ok(StationType::Espresso),
            "grinder" => Ok(StationType::Grinder),
            "steamer" => Ok(StationType::Steamer),
            "assembly" => Ok(StationType::Assembly),
            other => Err(KitchenError::InvalidInput(format!(
                "unknown station type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for StationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Equipment availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    InUse,
    Maintenance,
    Broken,
}

impl EquipmentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "available",
            EquipmentStatus::InUse => "in_use",
            EquipmentStatus::Maintenance => "maintenance",
            EquipmentStatus::Broken => "broken",
        }
    }
}

impl std::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order lifecycle status.
///
/// Transitions: Pending -> {Processing, Cancelled},
/// Processing -> {Completed, Cancelled}; Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: &'static [OrderStatus] = &[
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether the state machine permits moving to `next` from here.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Completed)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order priority bucket, ordered from Low to Urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl OrderPriority {
    pub const ALL: &'static [OrderPriority] = &[
        OrderPriority::Low,
        OrderPriority::Normal,
        OrderPriority::High,
        OrderPriority::Urgent,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderPriority::Low => "low",
            OrderPriority::Normal => "normal",
            OrderPriority::High => "high",
            OrderPriority::Urgent => "urgent",
        }
    }

    /// The next bucket up, clamped at Urgent.
    pub const fn promoted(&self) -> OrderPriority {
        match self {
            OrderPriority::Low => OrderPriority::Normal,
            OrderPriority::Normal => OrderPriority::High,
            OrderPriority::High => OrderPriority::Urgent,
            OrderPriority::Urgent => OrderPriority::Urgent,
        }
    }
}

impl std::fmt::Display for OrderPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_parse_round_trip() {
        for station in StationType::ALL {
            assert_eq!(StationType::parse(station.as_str()).unwrap(), *station);
        }
    }

    #[test]
    fn test_station_parse_rejects_unknown() {
        assert!(StationType::parse("dishwasher").is_err());
        assert!(StationType::parse("").is_err());
    }

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(OrderPriority::Urgent > OrderPriority::High);
        assert!(OrderPriority::High > OrderPriority::Normal);
        assert!(OrderPriority::Normal > OrderPriority::Low);
    }

    #[test]
    fn test_priority_promotion_clamps_at_urgent() {
        assert_eq!(OrderPriority::Low.promoted(), OrderPriority::Normal);
        assert_eq!(OrderPriority::High.promoted(), OrderPriority::Urgent);
        assert_eq!(OrderPriority::Urgent.promoted(), OrderPriority::Urgent);
    }
}
