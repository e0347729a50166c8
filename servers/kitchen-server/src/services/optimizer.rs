//! Deterministic workflow planner.
//!
//! Every function here is a pure function of its inputs: no I/O, no clock
//! reads, no randomness. The scheduler and the rebalance loop both call in.

use chrono::{DateTime, Duration, Utc};
use common::{EquipmentStatus, OrderPriority, OrderStatus, StationType};
use serde::{Deserialize, Serialize};
use store::models::{
    Equipment, Order, Staff, WorkflowOptimization, WorkflowOptimizationBuilder, WorkflowStep,
};
use utoipa::ToSchema;

/// Base preparation time granted to every order.
const BASE_PREPARATION_SECS: i64 = 60;

/// Baseline seconds per station used for efficiency-gain math.
const BASELINE_SECS_PER_STATION: i64 = 120;

/// Equipment allocations are planned over this window, in hours.
const ALLOCATION_WINDOW_HOURS: i64 = 2;

/// Staff utilization above this triggers a hiring recommendation.
const UTILIZATION_ALERT: f64 = 0.8;

fn priority_factor(priority: OrderPriority) -> f64 {
    match priority {
        OrderPriority::Urgent => 0.8,
        OrderPriority::High => 0.9,
        OrderPriority::Normal => 1.0,
        OrderPriority::Low => 1.2,
    }
}

fn station_base_secs(station: StationType) -> i64 {
    match station {
        StationType::Espresso => 90,
        StationType::Grinder => 30,
        StationType::Steamer => 60,
        StationType::Assembly => 45,
    }
}

fn station_required_skill(station: StationType) -> f64 {
    match station {
        StationType::Espresso => 8.0,
        StationType::Grinder => 5.0,
        StationType::Steamer => 7.0,
        StationType::Assembly => 6.0,
    }
}

fn station_parallelizable(station: StationType) -> bool {
    matches!(station, StationType::Grinder | StationType::Assembly)
}

/// Predict preparation time in whole seconds.
///
/// base 60s, plus per item `(30 + 10 * |requirements|) * quantity`, scaled by
/// `1 + 0.2 * |unique stations|` and the priority factor, truncated.
pub fn predict_preparation_time(order: &Order) -> i64 {
    let mut total = BASE_PREPARATION_SECS as f64;
    for item in &order.items {
        let item_secs = 30.0 + 10.0 * item.requirements.len() as f64;
        total += item_secs * f64::from(item.quantity);
    }

    total *= 1.0 + 0.2 * order.required_stations().len() as f64;
    total *= priority_factor(order.priority);
    total as i64
}

/// Plan the workflow for the first order in the list.
///
/// One step per unique required station, chained sequentially; step times are
/// the station base scaled by `1 + 0.1 * total quantity`.
pub fn optimize_workflow(orders: &[Order]) -> Option<WorkflowOptimization> {
    let order = orders.first()?;
    let quantity_scale = 1.0 + 0.1 * f64::from(order.total_quantity());

    let mut builder = WorkflowOptimizationBuilder::new(&order.id);
    let mut previous_step: Option<String> = None;
    for (index, station) in order.required_stations().into_iter().enumerate() {
        let step_id = format!("step-{}", index + 1);
        builder = builder.step(WorkflowStep {
            step_id: step_id.clone(),
            station,
            estimated_time_secs: (station_base_secs(station) as f64 * quantity_scale) as i64,
            required_skill: station_required_skill(station),
            depends_on: previous_step.iter().cloned().collect(),
            can_parallelize: station_parallelizable(station),
            equipment_id: None,
            staff_id: None,
        });
        previous_step = Some(step_id);
    }

    Some(builder.build(BASELINE_SECS_PER_STATION))
}

/// One order-to-staff binding proposed by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StaffAllocation {
    pub order_id: String,
    pub staff_id: String,
    pub station: StationType,
    pub estimated_time_secs: i64,
    pub efficiency: f64,
    pub reason: String,
}

/// Allocator output: bindings plus utilization advice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StaffAllocationPlan {
    pub allocations: Vec<StaffAllocation>,
    /// Mean workload across the full staff list.
    pub utilization: f64,
    pub unallocated_orders: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Match Pending orders to staff by station efficiency and spare capacity.
///
/// Orders are walked by priority descending (older first on ties); each order
/// scores candidates as `efficiency_for_station(primary) * (1 - workload)`
/// and takes the stable maximum.
pub fn allocate_staff(orders: &[Order], staff: &[Staff]) -> StaffAllocationPlan {
    let mut plan = StaffAllocationPlan::default();
    if !staff.is_empty() {
        plan.utilization =
            staff.iter().map(Staff::workload).sum::<f64>() / staff.len() as f64;
    }

    let mut sorted: Vec<&Order> = orders
        .iter()
        .filter(|order| order.status == OrderStatus::Pending)
        .collect();
    sorted.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    // Tentative assignments bump local copies so one pass cannot hand a
    // staff member more than their remaining capacity.
    let mut candidates: Vec<Staff> = staff.to_vec();

    for order in sorted {
        let required = order.required_stations();
        let Some(primary) = required.iter().next().copied() else {
            continue;
        };

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if !candidate.can_accept_order() || !candidate.covers_any(&required) {
                continue;
            }
            let score =
                candidate.efficiency_for_station(primary) * (1.0 - candidate.workload());
            // Strictly-greater keeps the first candidate on ties.
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, _)) => {
                let chosen = &mut candidates[index];
                plan.allocations.push(StaffAllocation {
                    order_id: order.id.clone(),
                    staff_id: chosen.id.clone(),
                    station: primary,
                    estimated_time_secs: predict_preparation_time(order),
                    efficiency: chosen.efficiency_for_station(primary),
                    reason: "optimal skill match".to_string(),
                });
                chosen.current_orders += 1;
            }
            None => plan.unallocated_orders.push(order.id.clone()),
        }
    }

    if plan.utilization > UTILIZATION_ALERT {
        plan.recommendations
            .push("staff utilization is high; consider adding staff".to_string());
    }
    if !plan.unallocated_orders.is_empty() {
        plan.recommendations.push(format!(
            "{} orders could not be allocated; consider adding staff",
            plan.unallocated_orders.len()
        ));
    }

    plan
}

/// A planned equipment booking window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EquipmentAllocation {
    pub equipment_id: String,
    pub station: StationType,
    pub order_ids: Vec<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub expected_load: u32,
}

/// Bind available equipment to the orders that need its station, planned over
/// a two-hour window starting at `now`.
pub fn optimize_equipment_usage(
    equipment: &[Equipment],
    orders: &[Order],
    now: DateTime<Utc>,
) -> Vec<EquipmentAllocation> {
    equipment
        .iter()
        .filter(|unit| unit.status == EquipmentStatus::Available)
        .map(|unit| {
            let order_ids: Vec<String> = orders
                .iter()
                .filter(|order| {
                    !order.status.is_terminal()
                        && order.required_stations().contains(&unit.station_type)
                })
                .map(|order| order.id.clone())
                .collect();

            EquipmentAllocation {
                equipment_id: unit.id.clone(),
                station: unit.station_type,
                order_ids,
                window_start: now,
                window_end: now + Duration::hours(ALLOCATION_WINDOW_HOURS),
                expected_load: unit.current_load,
            }
        })
        .collect()
}

/// Predicted near-term load per equipment unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EquipmentLoadForecast {
    pub equipment_id: String,
    pub station: StationType,
    pub current_load: u32,
    /// Demand heading at the unit, capped at its capacity.
    pub predicted_load: u32,
}

/// Spread pending station demand evenly over the units of each type.
pub fn predict_equipment_load(
    equipment: &[Equipment],
    orders: &[Order],
) -> Vec<EquipmentLoadForecast> {
    equipment
        .iter()
        .map(|unit| {
            let peers = equipment
                .iter()
                .filter(|other| other.station_type == unit.station_type)
                .count()
                .max(1) as u32;
            let demand: u32 = orders
                .iter()
                .filter(|order| {
                    order.status == OrderStatus::Pending
                        && order.required_stations().contains(&unit.station_type)
                })
                .map(Order::total_quantity)
                .sum();

            EquipmentLoadForecast {
                equipment_id: unit.id.clone(),
                station: unit.station_type,
                current_load: unit.current_load,
                predicted_load: (unit.current_load + demand.div_ceil(peers))
                    .min(unit.max_capacity),
            }
        })
        .collect()
}

/// Capacity forecast over a horizon.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CapacityForecast {
    pub hours: u32,
    pub predicted_orders: u32,
    /// Confidence in [0, 1], decaying with the horizon.
    pub confidence: f64,
}

/// Roughly ten orders per hour, with confidence decaying over the horizon.
pub fn predict_capacity(hours: u32) -> CapacityForecast {
    CapacityForecast {
        hours,
        predicted_orders: 10 * hours,
        confidence: (1.0 - 0.02 * f64::from(hours)).clamp(0.0, 1.0),
    }
}

/// A station whose demand outstrips its capacity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Bottleneck {
    pub station: StationType,
    /// Demand divided by spare capacity; above 1.0 means saturated.
    pub severity: f64,
    pub reason: String,
}

/// Compare per-station demand against spare equipment capacity.
pub fn analyze_bottlenecks(orders: &[Order], equipment: &[Equipment]) -> Vec<Bottleneck> {
    let mut bottlenecks = Vec::new();
    for station in StationType::ALL {
        let demand: u32 = orders
            .iter()
            .filter(|order| {
                !order.status.is_terminal() && order.required_stations().contains(station)
            })
            .map(Order::total_quantity)
            .sum();
        if demand == 0 {
            continue;
        }

        let capacity: u32 = equipment
            .iter()
            .filter(|unit| {
                unit.station_type == *station
                    && matches!(
                        unit.status,
                        EquipmentStatus::Available | EquipmentStatus::InUse
                    )
            })
            .map(|unit| unit.max_capacity - unit.current_load)
            .sum();

        let severity = f64::from(demand) / f64::from(capacity.max(1));
        if severity > 1.0 {
            bottlenecks.push(Bottleneck {
                station: *station,
                severity,
                reason: format!(
                    "{} units of demand against {} spare capacity at {}",
                    demand, capacity, station
                ),
            });
        }
    }
    bottlenecks
}

/// Human-readable advice combining the other analyses.
pub fn generate_recommendations(
    orders: &[Order],
    equipment: &[Equipment],
    staff: &[Staff],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    let plan = allocate_staff(orders, staff);
    recommendations.extend(plan.recommendations);

    for bottleneck in analyze_bottlenecks(orders, equipment) {
        recommendations.push(format!(
            "station {} is saturated (severity {:.1}); add equipment or reroute orders",
            bottleneck.station, bottleneck.severity
        ));
    }

    let broken = equipment
        .iter()
        .filter(|unit| unit.status == EquipmentStatus::Broken)
        .count();
    if broken > 0 {
        recommendations.push(format!("{broken} equipment units are broken; schedule repairs"));
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use store::models::OrderItem;

    fn item(id: &str, quantity: u32, stations: &[StationType]) -> OrderItem {
        OrderItem::new(id, "drink", quantity, "", stations.iter().copied().collect()).unwrap()
    }

    fn order(id: &str, priority: OrderPriority, items: Vec<OrderItem>) -> Order {
        Order::new(id, "c1", items, priority).unwrap()
    }

    #[test]
    fn test_predict_preparation_time_formula() {
        // One item, qty 2, two requirements:
        // 60 + (30 + 20) * 2 = 160; stations 2 -> *1.4 = 224; normal -> 224
        let o = order(
            "o1",
            OrderPriority::Normal,
            vec![item("i1", 2, &[StationType::Espresso, StationType::Grinder])],
        );
        assert_eq!(predict_preparation_time(&o), 224);

        // Urgent scales by 0.8 and truncates: 224 * 0.8 = 179.2 -> 179
        let urgent = order(
            "o2",
            OrderPriority::Urgent,
            vec![item("i1", 2, &[StationType::Espresso, StationType::Grinder])],
        );
        assert_eq!(predict_preparation_time(&urgent), 179);

        // Low scales by 1.2: 224 * 1.2 = 268.8 -> 268
        let low = order(
            "o3",
            OrderPriority::Low,
            vec![item("i1", 2, &[StationType::Espresso, StationType::Grinder])],
        );
        assert_eq!(predict_preparation_time(&low), 268);
    }

    #[test]
    fn test_predictions_are_deterministic() {
        let o = order(
            "o1",
            OrderPriority::High,
            vec![
                item("i1", 1, &[StationType::Espresso]),
                item("i2", 3, &[StationType::Steamer, StationType::Assembly]),
            ],
        );
        let first = predict_preparation_time(&o);
        for _ in 0..10 {
            assert_eq!(predict_preparation_time(&o), first);
        }

        let plan_a = optimize_workflow(std::slice::from_ref(&o)).unwrap();
        let plan_b = optimize_workflow(std::slice::from_ref(&o)).unwrap();
        assert_eq!(plan_a.estimated_time_secs, plan_b.estimated_time_secs);
        assert_eq!(plan_a.steps.len(), plan_b.steps.len());
    }

    #[test]
    fn test_workflow_plan_shape() {
        let o = order(
            "o1",
            OrderPriority::Normal,
            vec![item("i1", 2, &[StationType::Espresso, StationType::Grinder])],
        );
        let plan = optimize_workflow(&[o]).unwrap();

        assert_eq!(plan.order_id, "o1");
        assert_eq!(plan.steps.len(), 2);
        // qty 2 -> scale 1.2: espresso 90 -> 108, grinder 30 -> 36
        assert_eq!(plan.steps[0].estimated_time_secs, 108);
        assert_eq!(plan.steps[1].estimated_time_secs, 36);
        assert_eq!(plan.estimated_time_secs, 144);
        assert!(plan.steps[0].depends_on.is_empty());
        assert_eq!(plan.steps[1].depends_on, vec!["step-1".to_string()]);
        assert!(!plan.steps[0].can_parallelize);
        assert!(plan.steps[1].can_parallelize);
        assert_eq!(plan.steps[0].required_skill, 8.0);
        // baseline 240 vs 144 -> 40% gain
        assert!((plan.efficiency_gain_pct - 40.0).abs() < 1e-9);

        assert!(optimize_workflow(&[]).is_none());
    }

    #[test]
    fn test_allocate_staff_prefers_skill_and_is_stable() {
        let orders = vec![order(
            "o1",
            OrderPriority::Normal,
            vec![item("i1", 1, &[StationType::Espresso])],
        )];
        let skilled = Staff::new(
            "s-skilled",
            "A",
            BTreeSet::from([StationType::Espresso]),
            9.0,
            3,
        )
        .unwrap();
        let novice = Staff::new(
            "s-novice",
            "B",
            BTreeSet::from([StationType::Espresso]),
            4.0,
            3,
        )
        .unwrap();
        let twin = Staff::new(
            "s-twin",
            "C",
            BTreeSet::from([StationType::Espresso]),
            9.0,
            3,
        )
        .unwrap();

        let plan = allocate_staff(&orders, &[novice.clone(), skilled.clone(), twin]);
        assert_eq!(plan.allocations.len(), 1);
        // s-skilled and s-twin tie; the first in list order wins.
        assert_eq!(plan.allocations[0].staff_id, "s-skilled");
        assert_eq!(plan.allocations[0].reason, "optimal skill match");
    }

    #[test]
    fn test_allocate_staff_reports_unallocated() {
        let orders = vec![order(
            "o1",
            OrderPriority::Urgent,
            vec![item("i1", 1, &[StationType::Steamer])],
        )];
        let staff = vec![Staff::new(
            "s1",
            "A",
            BTreeSet::from([StationType::Espresso]),
            9.0,
            3,
        )
        .unwrap()];

        let plan = allocate_staff(&orders, &staff);
        assert!(plan.allocations.is_empty());
        assert_eq!(plan.unallocated_orders, vec!["o1".to_string()]);
        assert!(!plan.recommendations.is_empty());
    }

    #[test]
    fn test_allocate_staff_respects_capacity_within_one_pass() {
        let orders = vec![
            order("o1", OrderPriority::Normal, vec![item("a", 1, &[StationType::Grinder])]),
            order("o2", OrderPriority::Normal, vec![item("b", 1, &[StationType::Grinder])]),
        ];
        let staff = vec![Staff::new(
            "s1",
            "A",
            BTreeSet::from([StationType::Grinder]),
            8.0,
            1,
        )
        .unwrap()];

        let plan = allocate_staff(&orders, &staff);
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.unallocated_orders, vec!["o2".to_string()]);
    }

    #[test]
    fn test_high_utilization_recommendation() {
        let mut busy = Staff::new("s1", "A", BTreeSet::from([StationType::Espresso]), 8.0, 2)
            .unwrap();
        busy.current_orders = 2;

        let plan = allocate_staff(&[], &[busy]);
        assert!(plan.utilization > 0.8);
        assert!(plan
            .recommendations
            .iter()
            .any(|r| r.contains("utilization")));
    }

    #[test]
    fn test_equipment_usage_windows() {
        let now = Utc::now();
        let machine = Equipment::new("e1", "m", StationType::Espresso, 4, 7.0).unwrap();
        let orders = vec![order(
            "o1",
            OrderPriority::Normal,
            vec![item("i1", 1, &[StationType::Espresso])],
        )];

        let allocations = optimize_equipment_usage(&[machine], &orders, now);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].order_ids, vec!["o1".to_string()]);
        assert_eq!(allocations[0].window_end - allocations[0].window_start, Duration::hours(2));
    }

    #[test]
    fn test_capacity_forecast_bounds() {
        let forecast = predict_capacity(4);
        assert_eq!(forecast.predicted_orders, 40);
        assert!((0.0..=1.0).contains(&forecast.confidence));

        let far = predict_capacity(100);
        assert_eq!(far.confidence, 0.0);
    }

    #[test]
    fn test_bottleneck_detection() {
        let machine = Equipment::new("e1", "m", StationType::Espresso, 1, 7.0).unwrap();
        let orders = vec![order(
            "o1",
            OrderPriority::Normal,
            vec![item("i1", 5, &[StationType::Espresso])],
        )];

        let bottlenecks = analyze_bottlenecks(&orders, &[machine]);
        assert_eq!(bottlenecks.len(), 1);
        assert_eq!(bottlenecks[0].station, StationType::Espresso);
        assert!(bottlenecks[0].severity > 1.0);
    }
}
