//! Kitchen Server - Coffee Kitchen Backend
//!
//! Real-time kitchen order scheduler: accepts beverage orders, queues them
//! by priority, assigns staff and equipment, and fans lifecycle events out
//! over REST, WebSocket and the upstream order-service bridge.

use std::net::SocketAddr;
use std::sync::Arc;

use bridge::{InboundBridge, OrderServiceClient, OutboundBridge};
use common::event_types;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use kitchen_server::services::{JobsConfig, KitchenJobs};
use kitchen_server::state::AppState;
use kitchen_server::{app, routes};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coffee Kitchen API",
        version = "1.0.0",
        description = "Kitchen order scheduling for the coffee backend",
        license(name = "MIT")
    ),
    paths(
        routes::health::health,
        routes::orders::add_order,
        routes::orders::get_order,
        routes::queue::queue_status,
        routes::queue::next_order,
        routes::queue::optimize,
    ),
    components(schemas(
        routes::health::HealthResponse,
        common::errors::ErrorResponse,
        common::types::StationType,
        common::types::EquipmentStatus,
        common::types::OrderStatus,
        common::types::OrderPriority,
        store::models::Order,
        store::models::OrderItem,
        store::models::CreateOrder,
        store::models::CreateOrderItem,
        store::models::Equipment,
        store::models::CreateEquipment,
        store::models::Staff,
        store::models::CreateStaff,
        store::models::WorkflowOptimization,
        store::models::WorkflowStep,
        store::repositories::QueueStatus,
        store::repositories::CompletionStats,
        kitchen_server::services::QueueOverview,
        kitchen_server::services::KitchenMetrics,
        kitchen_server::services::PerformanceReport,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Orders", description = "Order intake and lifecycle"),
        (name = "Queue", description = "Queue status and optimization"),
        (name = "Equipment", description = "Workstation equipment management"),
        (name = "Staff", description = "Kitchen staff management"),
        (name = "Analytics", description = "Kitchen metrics and performance reports")
    )
)]
struct ApiDoc;

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|value| value != "false" && value != "0")
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Kitchen server v{} starting", env!("CARGO_PKG_VERSION"));

    // Store backend: Redis by default, in-memory for local development.
    let backend = env_string("STORE_BACKEND", "redis");
    let redis_url = env_string("REDIS_URL", "redis://127.0.0.1:6379");
    let kv = match backend.as_str() {
        "memory" => {
            tracing::warn!("using the in-memory store; state will not survive restarts");
            store::memory()
        }
        "redis" => store::connect_redis(&redis_url).await?,
        other => anyhow::bail!("unknown STORE_BACKEND: {other}"),
    };

    let state = AppState::new(kv);
    let restored = state.service.restore_queue().await?;
    tracing::info!(orders = restored, "queue projection restored");

    let cancel = CancellationToken::new();

    // Push channel: fan kitchen events out to connected WebSocket clients.
    let push_events = state.bus.subscribe("push-channel", &["kitchen.*"]).await;
    tokio::spawn(state.push.clone().run_pump(push_events, cancel.clone()));

    // Upstream order-service bridge, when configured.
    let upstream_url = std::env::var("UPSTREAM_ORDER_SERVICE_URL").ok();
    let upstream_client = upstream_url
        .as_deref()
        .map(|url| Arc::new(OrderServiceClient::new(url)));
    if let Some(client) = &upstream_client {
        let outbound_events = state
            .bus
            .subscribe(
                "outbound-bridge",
                &[
                    event_types::ORDER_STATUS_CHANGED,
                    event_types::ORDER_COMPLETED,
                ],
            )
            .await;
        let outbound = Arc::new(OutboundBridge::new(client.clone()));
        tokio::spawn(outbound.run(outbound_events, cancel.clone()));

        if backend == "redis" {
            let inbound = Arc::new(InboundBridge::new(state.service.clone()));
            let inbound_url = redis_url.clone();
            let inbound_cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(err) = inbound.run(inbound_url, inbound_cancel).await {
                    tracing::error!(error = %err, "inbound bridge terminated");
                }
            });
        } else {
            tracing::warn!("inbound bridge needs the Redis backend; not started");
        }
    } else {
        tracing::info!("UPSTREAM_ORDER_SERVICE_URL not set; bridge disabled");
    }

    // Background loops.
    let jobs_config = JobsConfig {
        enabled: env_flag("JOBS_ENABLED", true),
        rebalance_interval_secs: env_u64("REBALANCE_INTERVAL_SECS", 60),
        overdue_interval_secs: env_u64("OVERDUE_SWEEP_INTERVAL_SECS", 30),
        sync_interval_secs: env_u64("UPSTREAM_SYNC_INTERVAL_SECS", 30),
    };
    let jobs = Arc::new(KitchenJobs::new(
        state.service.clone(),
        upstream_client,
        jobs_config,
    ));
    let _job_handles = jobs.start(cancel.clone());

    // Router with Swagger UI on top of the API.
    let router = app(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let port = env_u64("PORT", 8090) as u16;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("kitchen server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    Ok(())
}
