//! Workflow optimization plans.

use chrono::{DateTime, Utc};
use common::StationType;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One station visit inside a workflow plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowStep {
    pub step_id: String,
    pub station: StationType,
    pub estimated_time_secs: i64,
    pub required_skill: f64,
    /// Step ids that must finish first.
    pub depends_on: Vec<String>,
    pub can_parallelize: bool,
    pub equipment_id: Option<String>,
    pub staff_id: Option<String>,
}

/// An immutable optimization plan for one order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowOptimization {
    pub id: String,
    pub order_id: String,
    pub steps: Vec<WorkflowStep>,
    /// Sum of the step estimates.
    pub estimated_time_secs: i64,
    pub efficiency_gain_pct: f64,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Builder accumulating steps and recommendations into a finished plan.
pub struct WorkflowOptimizationBuilder {
    order_id: String,
    steps: Vec<WorkflowStep>,
    recommendations: Vec<String>,
}

impl WorkflowOptimizationBuilder {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            steps: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn recommendation(mut self, text: impl Into<String>) -> Self {
        self.recommendations.push(text.into());
        self
    }

    /// Finish the plan. The efficiency gain compares the summed step times
    /// against `baseline_secs_per_station` for each step.
    pub fn build(self, baseline_secs_per_station: i64) -> WorkflowOptimization {
        let estimated_time_secs: i64 = self.steps.iter().map(|s| s.estimated_time_secs).sum();
        let baseline = baseline_secs_per_station * self.steps.len() as i64;
        let efficiency_gain_pct = if baseline > 0 {
            (baseline - estimated_time_secs) as f64 / baseline as f64 * 100.0
        } else {
            0.0
        };

        WorkflowOptimization {
            id: Uuid::new_v4().to_string(),
            order_id: self.order_id,
            steps: self.steps,
            estimated_time_secs,
            efficiency_gain_pct,
            recommendations: self.recommendations,
            created_at: Utc::now(),
        }
    }
}
