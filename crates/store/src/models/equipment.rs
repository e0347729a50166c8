//! Equipment entity and its guarded transitions.

use chrono::{DateTime, Utc};
use common::{EquipmentStatus, KitchenError, StationType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A workstation appliance.
///
/// Invariants: `current_load <= max_capacity`, InUse implies `current_load > 0`,
/// Broken never transitions directly to InUse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub station_type: StationType,
    pub status: EquipmentStatus,
    /// Efficiency score in [0, 10].
    pub efficiency_score: f64,
    pub current_load: u32,
    pub max_capacity: u32,
    pub last_maintenance: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Create equipment in Available state with zero load.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        station_type: StationType,
        max_capacity: u32,
        efficiency_score: f64,
    ) -> Result<Self, KitchenError> {
        let id = id.into();
        let name = name.into();

        if id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("equipment id is empty".into()));
        }
        if name.trim().is_empty() {
            return Err(KitchenError::InvalidInput("equipment name is empty".into()));
        }
        if max_capacity == 0 {
            return Err(KitchenError::InvalidInput(
                "max_capacity must be positive".into(),
            ));
        }
        if !(0.0..=10.0).contains(&efficiency_score) {
            return Err(KitchenError::InvalidInput(
                "efficiency_score must be within [0, 10]".into(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            station_type,
            status: EquipmentStatus::Available,
            efficiency_score,
            current_load: 0,
            max_capacity,
            last_maintenance: now,
            created_at: now,
            updated_at: now,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Guarded status transition.
    pub fn update_status(&mut self, next: EquipmentStatus) -> Result<(), KitchenError> {
        if self.status == EquipmentStatus::Broken && next == EquipmentStatus::InUse {
            return Err(KitchenError::InvalidState(format!(
                "equipment {} is broken and cannot go directly in use",
                self.id
            )));
        }
        if next == EquipmentStatus::InUse && self.current_load == 0 {
            return Err(KitchenError::InvalidState(format!(
                "equipment {} has no load to be in use",
                self.id
            )));
        }

        self.status = next;
        self.touch();
        Ok(())
    }

    /// Take on `amount` units of work; flips Available to InUse.
    pub fn add_load(&mut self, amount: u32) -> Result<(), KitchenError> {
        match self.status {
            EquipmentStatus::Maintenance | EquipmentStatus::Broken => {
                return Err(KitchenError::InvalidState(format!(
                    "equipment {} is {} and cannot take load",
                    self.id, self.status
                )));
            }
            EquipmentStatus::Available | EquipmentStatus::InUse => {}
        }
        if self.current_load + amount > self.max_capacity {
            return Err(KitchenError::InvalidState(format!(
                "equipment {} load {}+{} would exceed capacity {}",
                self.id, self.current_load, amount, self.max_capacity
            )));
        }

        self.current_load += amount;
        if self.current_load > 0 {
            self.status = EquipmentStatus::InUse;
        }
        self.touch();
        Ok(())
    }

    /// Release `amount` units of work; flips InUse to Available at zero.
    pub fn remove_load(&mut self, amount: u32) -> Result<(), KitchenError> {
        if amount > self.current_load {
            return Err(KitchenError::InvalidState(format!(
                "equipment {} cannot release {} of {} load",
                self.id, amount, self.current_load
            )));
        }

        self.current_load -= amount;
        if self.current_load == 0 && self.status == EquipmentStatus::InUse {
            self.status = EquipmentStatus::Available;
        }
        self.touch();
        Ok(())
    }

    /// Move into Maintenance; forbidden while InUse.
    pub fn schedule_maintenance(&mut self) -> Result<(), KitchenError> {
        if self.status == EquipmentStatus::InUse {
            return Err(KitchenError::InvalidState(format!(
                "equipment {} is in use and cannot enter maintenance",
                self.id
            )));
        }

        self.status = EquipmentStatus::Maintenance;
        self.last_maintenance = Utc::now();
        self.touch();
        Ok(())
    }

    pub fn is_at_capacity(&self) -> bool {
        self.current_load >= self.max_capacity
    }
}

/// Request to create equipment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateEquipment {
    /// Explicit id; a fresh UUID is assigned when omitted.
    pub id: Option<String>,
    pub name: String,
    pub station_type: StationType,
    pub max_capacity: u32,
    /// Defaults to 5.0 when omitted.
    pub efficiency_score: Option<f64>,
}

/// Query filters for listing equipment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EquipmentQuery {
    pub station_type: Option<StationType>,
    pub status: Option<EquipmentStatus>,
    pub available_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}
