//! End-to-end scheduler flows through the service layer.

use chrono::{Duration, Utc};
use common::{event_types, EquipmentStatus, KitchenError, OrderPriority, OrderStatus, StationType};
use store::repositories::OrderRepository;

use crate::support::{barista, drain_events, espresso_equipment, espresso_order, TestApp};

#[tokio::test]
async fn test_happy_path_order_lifecycle() {
    let app = TestApp::new().await;
    let mut events = app.events().await;

    app.state
        .service
        .create_equipment(espresso_equipment("espresso-01", 1))
        .await
        .unwrap();
    app.state
        .service
        .create_staff(barista(
            "s1",
            &[StationType::Espresso, StationType::Grinder],
            8.5,
            3,
        ))
        .await
        .unwrap();

    let order = app
        .state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::Normal))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.estimated_time_secs > 0);

    let overview = app.state.service.queue_overview().await.unwrap();
    assert_eq!(overview.status.total_orders, 1);
    assert_eq!(overview.status.pending_orders, 1);

    // Assignment binds the staff member and the free espresso machine.
    let assigned = app
        .state
        .service
        .assign_order_to_staff("o1", "s1")
        .await
        .unwrap();
    assert_eq!(assigned.assigned_staff_id.as_deref(), Some("s1"));
    assert_eq!(assigned.assigned_equipment, vec!["espresso-01".to_string()]);
    assert!(assigned.is_ready_to_start());

    let machine = app.state.service.get_equipment("espresso-01").await.unwrap();
    assert_eq!(machine.status, EquipmentStatus::InUse);
    assert_eq!(machine.current_load, 1);

    let started = app.state.service.start_order("o1").await.unwrap();
    assert_eq!(started.status, OrderStatus::Processing);
    assert!(started.started_at.is_some());

    let completed = app.state.service.complete_order("o1").await.unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    let completed_at = completed.completed_at.unwrap();
    let started_at = completed.started_at.unwrap();
    assert_eq!(
        completed.actual_time_secs,
        (completed_at - started_at).num_seconds().max(0)
    );

    // Staff slot and equipment load are released.
    let staff = app.state.service.get_staff("s1").await.unwrap();
    assert_eq!(staff.current_orders, 0);
    let machine = app.state.service.get_equipment("espresso-01").await.unwrap();
    assert_eq!(machine.status, EquipmentStatus::Available);
    assert_eq!(machine.current_load, 0);

    let emitted: Vec<String> = drain_events(&mut events)
        .into_iter()
        .map(|event| event.event_type)
        .collect();
    for expected in [
        event_types::ORDER_ADDED_TO_QUEUE,
        event_types::ORDER_ASSIGNED,
        event_types::STAFF_ASSIGNED,
        event_types::ORDER_STARTED,
        event_types::ORDER_COMPLETED,
    ] {
        assert!(emitted.contains(&expected.to_string()), "missing {expected}");
    }
    // status_changed fired for both transitions
    assert_eq!(
        emitted
            .iter()
            .filter(|t| *t == event_types::ORDER_STATUS_CHANGED)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_assignment_requires_station_overlap() {
    let app = TestApp::new().await;

    app.state
        .service
        .create_staff(barista("s2", &[StationType::Steamer], 7.0, 3))
        .await
        .unwrap();
    app.state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::Normal))
        .await
        .unwrap();

    let err = app.state.service.assign_order_to_staff("o1", "s2").await;
    assert!(matches!(err, Err(KitchenError::InvalidState(_))));

    // Nothing was committed on either side.
    let staff = app.state.service.get_staff("s2").await.unwrap();
    assert_eq!(staff.current_orders, 0);
    let order = app.state.service.get_order("o1").await.unwrap();
    assert!(order.assigned_staff_id.is_none());
}

#[tokio::test]
async fn test_starvation_promotion_emits_once() {
    let app = TestApp::new().await;
    let orders = OrderRepository::new(app.kv.clone());

    app.state
        .service
        .add_order(espresso_order("o4", "c1", OrderPriority::Low))
        .await
        .unwrap();

    // Nothing to promote yet.
    assert_eq!(app.state.service.rebalance_queue().await.unwrap(), 0);

    // Backdate the order by 16 minutes and rebuild the projection.
    let mut stored = orders.get("o4").await.unwrap();
    stored.created_at = Utc::now() - Duration::minutes(16);
    stored.updated_at = stored.created_at;
    orders.update(&stored).await.unwrap();
    app.state.service.restore_queue().await.unwrap();

    let mut events = app.events().await;
    assert_eq!(app.state.service.rebalance_queue().await.unwrap(), 1);

    let promoted = app.state.service.get_order("o4").await.unwrap();
    assert_eq!(promoted.priority, OrderPriority::Normal);

    let priority_events: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter(|event| event.event_type == event_types::ORDER_PRIORITY_CHANGED)
        .collect();
    assert_eq!(priority_events.len(), 1);
    assert_eq!(priority_events[0].data["new_priority"], "normal");

    // An immediate second pass does not promote again.
    assert_eq!(app.state.service.rebalance_queue().await.unwrap(), 0);
}

#[tokio::test]
async fn test_overdue_detection_and_idempotent_notice() {
    let app = TestApp::new().await;
    let orders = OrderRepository::new(app.kv.clone());

    app.state
        .service
        .create_equipment(espresso_equipment("espresso-01", 2))
        .await
        .unwrap();
    app.state
        .service
        .create_staff(barista(
            "s1",
            &[StationType::Espresso, StationType::Grinder],
            8.0,
            3,
        ))
        .await
        .unwrap();
    app.state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::Normal))
        .await
        .unwrap();
    app.state
        .service
        .assign_order_to_staff("o1", "s1")
        .await
        .unwrap();
    app.state.service.start_order("o1").await.unwrap();

    // Started two minutes ago against a one-minute estimate.
    let mut stored = orders.get("o1").await.unwrap();
    stored.estimated_time_secs = 60;
    stored.started_at = Some(Utc::now() - Duration::seconds(120));
    orders.update(&stored).await.unwrap();
    app.state.service.restore_queue().await.unwrap();

    let mut events = app.events().await;
    let overview = app.state.service.queue_overview().await.unwrap();
    assert_eq!(overview.overdue_orders.len(), 1);
    assert_eq!(overview.overdue_orders[0].id, "o1");

    let overdue_events: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter(|event| event.event_type == event_types::ORDER_OVERDUE)
        .collect();
    assert_eq!(overdue_events.len(), 1);
    assert!(overdue_events[0].data["overdue_by"].as_i64().unwrap() >= 59);

    // Still overdue on the next read, but no repeated event.
    let overview = app.state.service.queue_overview().await.unwrap();
    assert_eq!(overview.overdue_orders.len(), 1);
    let repeated: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter(|event| event.event_type == event_types::ORDER_OVERDUE)
        .collect();
    assert!(repeated.is_empty());

    // Completion ends the overdue episode.
    app.state.service.complete_order("o1").await.unwrap();
    let overview = app.state.service.queue_overview().await.unwrap();
    assert!(overview.overdue_orders.is_empty());
}

#[tokio::test]
async fn test_queue_reconstruction_matches_canonical_order() {
    let app = TestApp::new().await;

    app.state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::Normal))
        .await
        .unwrap();
    app.state
        .service
        .add_order(espresso_order("o2", "c1", OrderPriority::Urgent))
        .await
        .unwrap();
    app.state
        .service
        .add_order(espresso_order("o3", "c2", OrderPriority::Low))
        .await
        .unwrap();
    app.state
        .service
        .add_order(espresso_order("o4", "c2", OrderPriority::Urgent))
        .await
        .unwrap();

    // A second service instance over the same store rebuilds the same queue.
    let reloaded = kitchen_server::state::AppState::new(app.kv.clone());
    reloaded.service.restore_queue().await.unwrap();

    let overview = reloaded.service.queue_overview().await.unwrap();
    assert_eq!(overview.status.total_orders, 4);

    let original = app.state.service.queue_overview().await.unwrap();
    assert_eq!(original.status.total_orders, 4);
    assert_eq!(
        original.status.by_priority[&OrderPriority::Urgent],
        overview.status.by_priority[&OrderPriority::Urgent]
    );
}

#[tokio::test]
async fn test_terminal_orders_reject_further_mutation() {
    let app = TestApp::new().await;

    app.state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::Normal))
        .await
        .unwrap();
    app.state
        .service
        .update_order_status("o1", OrderStatus::Cancelled)
        .await
        .unwrap();

    assert!(matches!(
        app.state
            .service
            .update_order_status("o1", OrderStatus::Processing)
            .await,
        Err(KitchenError::InvalidState(_))
    ));
    assert!(matches!(
        app.state
            .service
            .update_order_priority("o1", OrderPriority::Urgent)
            .await,
        Err(KitchenError::InvalidState(_))
    ));

    // Cancelled orders left the queue.
    let overview = app.state.service.queue_overview().await.unwrap();
    assert_eq!(overview.status.total_orders, 0);
}

#[tokio::test]
async fn test_staff_counter_reconciliation() {
    let app = TestApp::new().await;
    let orders = OrderRepository::new(app.kv.clone());

    app.state
        .service
        .create_equipment(espresso_equipment("espresso-01", 2))
        .await
        .unwrap();
    app.state
        .service
        .create_staff(barista(
            "s1",
            &[StationType::Espresso, StationType::Grinder],
            8.0,
            3,
        ))
        .await
        .unwrap();
    app.state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::Normal))
        .await
        .unwrap();
    app.state
        .service
        .assign_order_to_staff("o1", "s1")
        .await
        .unwrap();

    // Cancelling an assigned order leaves the staff counter stale until the
    // reconciliation pass runs; only completion releases the slot inline.
    app.state
        .service
        .update_order_status("o1", OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(
        app.state.service.get_staff("s1").await.unwrap().current_orders,
        1
    );

    let repaired = app.state.service.reconcile_staff_counters().await.unwrap();
    assert_eq!(repaired, 1);
    assert_eq!(
        app.state.service.get_staff("s1").await.unwrap().current_orders,
        0
    );

    // The by-staff index agrees with the counter afterwards.
    let active = orders
        .list_by_staff("s1")
        .await
        .unwrap()
        .into_iter()
        .filter(|order| !order.status.is_terminal())
        .count();
    assert_eq!(active, 0);
}

#[tokio::test]
async fn test_optimize_queue_persists_plan() {
    let app = TestApp::new().await;
    let mut events = app.events().await;

    assert!(matches!(
        app.state.service.optimize_queue().await,
        Err(KitchenError::InvalidState(_))
    ));

    app.state
        .service
        .add_order(espresso_order("o1", "c1", OrderPriority::High))
        .await
        .unwrap();

    let plan = app.state.service.optimize_queue().await.unwrap();
    assert_eq!(plan.order_id, "o1");
    assert_eq!(plan.steps.len(), 2);

    let queue_repo = store::repositories::QueueRepository::new(app.kv.clone());
    let persisted = queue_repo.optimization("o1").await.unwrap().unwrap();
    assert_eq!(persisted.id, plan.id);

    assert!(drain_events(&mut events)
        .iter()
        .any(|event| event.event_type == event_types::WORKFLOW_OPTIMIZED));
}
