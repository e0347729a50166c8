//! Inbound bridge against the real scheduler.

use bridge::InboundBridge;
use common::{channels, event_types, KitchenError, OrderStatus, StationType};
use serde_json::json;

use crate::support::{drain_events, TestApp};

#[tokio::test]
async fn test_upstream_order_lifecycle() {
    let app = TestApp::new().await;
    let bridge = InboundBridge::new(app.state.service.clone());
    let mut events = app.events().await;

    // A cappuccino order arrives from the upstream order service.
    bridge
        .handle(
            channels::ORDER_CREATED,
            &json!({
                "order_id": "up-1",
                "customer_id": "c9",
                "items": [{"name": "Cappuccino", "quantity": 1}]
            }),
        )
        .await
        .unwrap();

    let order = app.state.service.get_order("up-1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    let stations = order.required_stations();
    assert!(stations.contains(&StationType::Espresso));
    assert!(stations.contains(&StationType::Grinder));
    assert!(stations.contains(&StationType::Steamer));

    // Cancellation flows through to the scheduler and emits status_changed.
    bridge
        .handle(channels::ORDER_CANCELLED, &json!({"order_id": "up-1"}))
        .await
        .unwrap();

    let order = app.state.service.get_order("up-1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    let emitted = drain_events(&mut events);
    assert!(emitted
        .iter()
        .any(|event| event.event_type == event_types::ORDER_STATUS_CHANGED
            && event.data["new_status"] == "cancelled"));
    assert!(emitted
        .iter()
        .any(|event| event.event_type == event_types::ORDER_CANCELLED));
}

#[tokio::test]
async fn test_payment_confirmation_starts_ready_orders() {
    let app = TestApp::new().await;
    let bridge = InboundBridge::new(app.state.service.clone());

    app.state
        .service
        .create_equipment(crate::support::espresso_equipment("espresso-01", 2))
        .await
        .unwrap();
    app.state
        .service
        .create_staff(crate::support::barista(
            "s1",
            &[StationType::Espresso, StationType::Grinder],
            8.0,
            3,
        ))
        .await
        .unwrap();

    bridge
        .handle(
            channels::ORDER_CREATED,
            &json!({
                "order_id": "up-2",
                "customer_id": "c9",
                "items": [{"name": "Espresso", "quantity": 1}]
            }),
        )
        .await
        .unwrap();

    // Payment confirmation before assignment cannot start the order.
    let err = bridge
        .handle(channels::ORDER_PAYMENT_CONFIRMED, &json!({"order_id": "up-2"}))
        .await;
    assert!(matches!(err, Err(KitchenError::InvalidState(_))));

    app.state
        .service
        .assign_order_to_staff("up-2", "s1")
        .await
        .unwrap();
    bridge
        .handle(channels::ORDER_PAYMENT_CONFIRMED, &json!({"order_id": "up-2"}))
        .await
        .unwrap();

    let order = app.state.service.get_order("up-2").await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_unknown_upstream_events_are_ignored() {
    let app = TestApp::new().await;
    let bridge = InboundBridge::new(app.state.service.clone());
    let mut events = app.events().await;

    bridge
        .handle("events:order:order.reopened", &json!({"order_id": "x"}))
        .await
        .unwrap();

    assert!(drain_events(&mut events).is_empty());
    assert!(matches!(
        app.state.service.get_order("x").await,
        Err(KitchenError::NotFound(_))
    ));
}
