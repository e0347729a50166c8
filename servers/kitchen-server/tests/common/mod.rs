//! Common test utilities for integration tests.
//!
//! Builds the application over the in-memory store so tests run without a
//! Redis instance.

use std::collections::BTreeSet;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{KitchenEvent, OrderPriority, StationType};
use http_body_util::BodyExt;
use kitchen_server::state::AppState;
use serde::de::DeserializeOwned;
use serde_json::Value;
use store::models::{CreateEquipment, CreateOrder, CreateOrderItem, CreateStaff};
use store::KvHandle;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Test application wrapper.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub kv: KvHandle,
}

impl TestApp {
    /// Create a new test application over a fresh in-memory store.
    pub async fn new() -> Self {
        let kv = store::memory();
        let state = AppState::new(kv.clone());
        state
            .service
            .restore_queue()
            .await
            .expect("queue restore failed");

        Self {
            router: kitchen_server::app(state.clone()),
            state,
            kv,
        }
    }

    /// Subscribe to all kitchen events emitted from this app.
    pub async fn events(&self) -> mpsc::Receiver<KitchenEvent> {
        self.state.bus.subscribe("test-listener", &["kitchen.*"]).await
    }

    /// Issue a JSON request against the router and decode the response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, T) {
        let mut builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|err| panic!("bad response body ({err}): {bytes:?}"));
        (status, value)
    }
}

/// Drain every event currently sitting in the receiver.
pub fn drain_events(rx: &mut mpsc::Receiver<KitchenEvent>) -> Vec<KitchenEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn espresso_equipment(id: &str, max_capacity: u32) -> CreateEquipment {
    CreateEquipment {
        id: Some(id.to_string()),
        name: format!("Espresso machine {id}"),
        station_type: StationType::Espresso,
        max_capacity,
        efficiency_score: Some(8.0),
    }
}

pub fn barista(id: &str, stations: &[StationType], skill: f64, max_concurrent: u32) -> CreateStaff {
    CreateStaff {
        id: Some(id.to_string()),
        name: format!("Barista {id}"),
        specializations: stations.iter().copied().collect(),
        skill_level: skill,
        max_concurrent,
    }
}

pub fn espresso_order(id: &str, customer: &str, priority: OrderPriority) -> CreateOrder {
    CreateOrder {
        id: Some(id.to_string()),
        customer_id: customer.to_string(),
        items: vec![CreateOrderItem {
            id: Some(format!("{id}-i1")),
            name: "Espresso".to_string(),
            quantity: 2,
            instructions: String::new(),
            requirements: BTreeSet::from([StationType::Espresso, StationType::Grinder]),
            metadata: Default::default(),
        }],
        priority: Some(priority),
    }
}
