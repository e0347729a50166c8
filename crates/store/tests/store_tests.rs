//! Store-layer integration tests.
//!
//! The in-memory backend runs by default. Tests against a real Redis are
//! marked #[ignore]; point TEST_REDIS_URL at a disposable instance and run:
//! cargo test --test store_tests -- --ignored --test-threads=1

use std::collections::BTreeSet;

use common::{OrderPriority, OrderStatus, StationType};
use store::models::{Order, OrderItem, Staff};
use store::repositories::{OrderRepository, QueueRepository, StaffRepository};
use store::{Kv, KvBatch};

fn order(id: &str, priority: OrderPriority) -> Order {
    let item = OrderItem::new(
        format!("{id}-i1"),
        "Latte",
        1,
        "",
        BTreeSet::from([StationType::Espresso, StationType::Steamer]),
    )
    .unwrap();
    Order::new(id, "c1", vec![item], priority).unwrap()
}

#[tokio::test]
async fn test_order_and_staff_indexes_stay_consistent() {
    let kv = store::memory();
    let orders = OrderRepository::new(kv.clone());
    let staff = StaffRepository::new(kv.clone());

    staff
        .create(
            &Staff::new(
                "s1",
                "Mika",
                BTreeSet::from([StationType::Espresso, StationType::Steamer]),
                8.0,
                2,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let mut o = order("o1", OrderPriority::High);
    o.assign_staff("s1").unwrap();
    orders.create(&o).await.unwrap();

    // The by-staff index and the staff record agree on assignment.
    let assigned = orders.list_by_staff("s1").await.unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].id, "o1");

    o.update_status(OrderStatus::Processing).unwrap();
    o.update_status(OrderStatus::Completed).unwrap();
    orders.update(&o).await.unwrap();

    let completed = orders.list_by_status(OrderStatus::Completed).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert!(orders
        .list_by_status(OrderStatus::Pending)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_queue_sequence_survives_reload() {
    let kv = store::memory();
    let queue = QueueRepository::new(kv.clone());
    let orders = OrderRepository::new(kv.clone());

    for (id, priority) in [
        ("o1", OrderPriority::Normal),
        ("o2", OrderPriority::Urgent),
        ("o3", OrderPriority::Low),
    ] {
        orders.create(&order(id, priority)).await.unwrap();
    }
    queue
        .save_ids(&["o2".into(), "o1".into(), "o3".into()])
        .await
        .unwrap();

    // A second repository over the same backend sees the same sequence.
    let reloaded = QueueRepository::new(kv);
    assert_eq!(reloaded.load_ids().await.unwrap(), vec!["o2", "o1", "o3"]);
}

#[tokio::test]
async fn test_batches_leave_no_partial_state() {
    let kv = store::memory();

    let batch = KvBatch::new()
        .put("kitchen:order:o1", r#"{"id":"o1"}"#)
        .set_add("kitchen:order:all", "o1")
        .set_add("kitchen:order:by_status:pending", "o1");
    kv.apply(batch).await.unwrap();

    assert!(kv.get("kitchen:order:o1").await.unwrap().is_some());
    assert!(kv
        .set_contains("kitchen:order:all", "o1")
        .await
        .unwrap());
    assert!(kv
        .set_contains("kitchen:order:by_status:pending", "o1")
        .await
        .unwrap());
}

// =============================================================================
// Redis-backed tests (require TEST_REDIS_URL)
// =============================================================================

async fn redis_kv() -> store::KvHandle {
    let url = std::env::var("TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string());
    store::connect_redis(&url).await.expect("redis unavailable")
}

#[tokio::test]
#[ignore]
async fn test_redis_round_trip() {
    let kv = redis_kv().await;
    let orders = OrderRepository::new(kv.clone());

    let _ = orders.delete("it-o1").await;
    orders.create(&order("it-o1", OrderPriority::Urgent)).await.unwrap();

    let loaded = orders.get("it-o1").await.unwrap();
    assert_eq!(loaded.priority, OrderPriority::Urgent);
    assert!(orders
        .list_by_priority(OrderPriority::Urgent)
        .await
        .unwrap()
        .iter()
        .any(|o| o.id == "it-o1"));

    orders.delete("it-o1").await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_batch_atomicity_shape() {
    let kv = redis_kv().await;

    kv.apply(
        KvBatch::new()
            .put("kitchen:test:k", "v")
            .set_add("kitchen:test:s", "m")
            .expire("kitchen:test:k", 60),
    )
    .await
    .unwrap();

    assert_eq!(kv.get("kitchen:test:k").await.unwrap(), Some("v".into()));
    assert!(kv.set_contains("kitchen:test:s", "m").await.unwrap());

    kv.delete("kitchen:test:k").await.unwrap();
    kv.delete("kitchen:test:s").await.unwrap();
}
