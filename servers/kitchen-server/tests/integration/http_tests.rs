//! REST surface tests via the router.

use axum::http::{Method, StatusCode};
use common::OrderPriority;
use serde_json::{json, Value};

use crate::support::{espresso_order, TestApp};

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let (status, body): (_, Value) = app.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_order_flow_over_http() {
    let app = TestApp::new().await;

    let (status, _): (_, Value) = app
        .request(
            Method::POST,
            "/api/v1/equipment",
            Some(json!({
                "id": "espresso-01",
                "name": "La Marzocco",
                "station_type": "espresso",
                "max_capacity": 1,
                "efficiency_score": 8.0
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _): (_, Value) = app
        .request(
            Method::POST,
            "/api/v1/staff",
            Some(json!({
                "id": "s1",
                "name": "Mika",
                "specializations": ["espresso", "grinder"],
                "skill_level": 8.5,
                "max_concurrent": 3
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, order): (_, Value) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "id": "o1",
                "customer_id": "c1",
                "items": [{
                    "id": "i1",
                    "name": "Espresso",
                    "quantity": 2,
                    "requirements": ["espresso", "grinder"]
                }],
                "priority": "normal"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert!(order["estimated_time_secs"].as_i64().unwrap() > 0);

    let (status, overview): (_, Value) = app
        .request(Method::GET, "/api/v1/queue/status", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["status"]["total_orders"], 1);
    assert_eq!(overview["status"]["pending_orders"], 1);

    let (status, _): (_, Value) = app
        .request(
            Method::POST,
            "/api/v1/orders/o1/assign",
            Some(json!({"staff_id": "s1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, next): (_, Value) = app.request(Method::GET, "/api/v1/queue/next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next["id"], "o1");

    let (status, started): (_, Value) = app
        .request(Method::POST, "/api/v1/orders/o1/start", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "processing");

    let (status, completed): (_, Value) = app
        .request(Method::POST, "/api/v1/orders/o1/complete", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert!(completed["completed_at"].is_string());
}

#[tokio::test]
async fn test_error_mapping() {
    let app = TestApp::new().await;

    // Unknown order -> 404 with the standard error body.
    let (status, body): (_, Value) = app
        .request(Method::GET, "/api/v1/orders/missing", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    // Empty item list -> 400.
    let (status, body): (_, Value) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({"id": "o1", "customer_id": "c1", "items": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    // Duplicate id -> 409.
    app.state
        .service
        .add_order(espresso_order("o2", "c1", OrderPriority::Normal))
        .await
        .unwrap();
    let (status, body): (_, Value) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "id": "o2",
                "customer_id": "c1",
                "items": [{
                    "id": "i1",
                    "name": "Espresso",
                    "quantity": 1,
                    "requirements": ["espresso"]
                }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    // Completing a Pending order -> 422.
    let (status, body): (_, Value) = app
        .request(Method::POST, "/api/v1/orders/o2/complete", None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_list_filters_over_http() {
    let app = TestApp::new().await;

    for (id, station) in [
        ("e1", "espresso"),
        ("e2", "grinder"),
        ("e3", "grinder"),
    ] {
        let (status, _): (_, Value) = app
            .request(
                Method::POST,
                "/api/v1/equipment",
                Some(json!({
                    "id": id,
                    "name": format!("unit {id}"),
                    "station_type": station,
                    "max_capacity": 2
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, listed): (_, Value) = app
        .request(
            Method::GET,
            "/api/v1/equipment?station_type=grinder&available_only=true",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (_, staff_listed): (_, Value) = app
        .request(Method::GET, "/api/v1/staff?min_skill=5", None)
        .await;
    assert!(staff_listed.as_array().unwrap().is_empty());
}
