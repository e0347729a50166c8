//! Staff entity and assignment guards.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{KitchenError, StationType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A kitchen staff member.
///
/// Invariants: `specializations` is never empty and
/// `current_orders <= max_concurrent`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub specializations: BTreeSet<StationType>,
    /// Skill level in [0, 10].
    pub skill_level: f64,
    pub is_available: bool,
    pub current_orders: u32,
    pub max_concurrent: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        specializations: BTreeSet<StationType>,
        skill_level: f64,
        max_concurrent: u32,
    ) -> Result<Self, KitchenError> {
        let id = id.into();
        let name = name.into();

        if id.trim().is_empty() {
            return Err(KitchenError::InvalidInput("staff id is empty".into()));
        }
        if name.trim().is_empty() {
            return Err(KitchenError::InvalidInput("staff name is empty".into()));
        }
        if specializations.is_empty() {
            return Err(KitchenError::InvalidInput(
                "staff needs at least one specialization".into(),
            ));
        }
        if !(0.0..=10.0).contains(&skill_level) {
            return Err(KitchenError::InvalidInput(
                "skill_level must be within [0, 10]".into(),
            ));
        }
        if max_concurrent == 0 {
            return Err(KitchenError::InvalidInput(
                "max_concurrent must be positive".into(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            name,
            specializations,
            skill_level,
            is_available: true,
            current_orders: 0,
            max_concurrent,
            created_at: now,
            updated_at: now,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether another order can be accepted right now.
    pub fn can_accept_order(&self) -> bool {
        self.is_available && self.current_orders < self.max_concurrent
    }

    /// Whether at least one of `stations` is covered.
    pub fn covers_any(&self, stations: &BTreeSet<StationType>) -> bool {
        stations
            .iter()
            .any(|station| self.specializations.contains(station))
    }

    /// Accept an order requiring `stations`.
    pub fn assign_order(&mut self, stations: &BTreeSet<StationType>) -> Result<(), KitchenError> {
        if !self.is_available {
            return Err(KitchenError::InvalidState(format!(
                "staff {} is not available",
                self.id
            )));
        }
        if self.current_orders >= self.max_concurrent {
            return Err(KitchenError::InvalidState(format!(
                "staff {} already handles {} orders",
                self.id, self.current_orders
            )));
        }
        if !self.covers_any(stations) {
            return Err(KitchenError::InvalidState(format!(
                "staff {} covers none of the required stations",
                self.id
            )));
        }

        self.current_orders += 1;
        self.touch();
        Ok(())
    }

    /// Release one order slot; the count never goes negative.
    pub fn complete_order(&mut self) -> Result<(), KitchenError> {
        if self.current_orders == 0 {
            return Err(KitchenError::InvalidState(format!(
                "staff {} has no orders to complete",
                self.id
            )));
        }
        self.current_orders -= 1;
        self.touch();
        Ok(())
    }

    pub fn update_availability(&mut self, is_available: bool) {
        self.is_available = is_available;
        self.touch();
    }

    pub fn update_skill(&mut self, skill_level: f64) -> Result<(), KitchenError> {
        if !(0.0..=10.0).contains(&skill_level) {
            return Err(KitchenError::InvalidInput(
                "skill_level must be within [0, 10]".into(),
            ));
        }
        self.skill_level = skill_level;
        self.touch();
        Ok(())
    }

    pub fn add_specialization(&mut self, station: StationType) {
        self.specializations.insert(station);
        self.touch();
    }

    /// Remove a specialization; the set may not become empty.
    pub fn remove_specialization(&mut self, station: StationType) -> Result<(), KitchenError> {
        if self.specializations.len() == 1 && self.specializations.contains(&station) {
            return Err(KitchenError::InvalidState(format!(
                "staff {} must keep at least one specialization",
                self.id
            )));
        }
        self.specializations.remove(&station);
        self.touch();
        Ok(())
    }

    /// Fraction of concurrent capacity in use, in [0, 1].
    pub fn workload(&self) -> f64 {
        f64::from(self.current_orders) / f64::from(self.max_concurrent)
    }

    /// Effective efficiency for a station: skill minus a workload penalty,
    /// clamped at zero; zero when the station is not covered.
    pub fn efficiency_for_station(&self, station: StationType) -> f64 {
        if !self.specializations.contains(&station) {
            return 0.0;
        }
        (self.skill_level - 2.0 * self.workload()).max(0.0)
    }

    pub fn is_overloaded(&self) -> bool {
        self.current_orders >= self.max_concurrent
    }
}

/// Request to create a staff member.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateStaff {
    /// Explicit id; a fresh UUID is assigned when omitted.
    pub id: Option<String>,
    pub name: String,
    pub specializations: BTreeSet<StationType>,
    pub skill_level: f64,
    pub max_concurrent: u32,
}

/// Query filters for listing staff.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaffQuery {
    pub specialization: Option<StationType>,
    pub available_only: Option<bool>,
    pub min_skill: Option<f64>,
}
