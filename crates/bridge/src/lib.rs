//! Bridge to the upstream order service.
//!
//! The outbound side translates selected domain events into upstream calls;
//! the inbound side consumes upstream order-lifecycle events and drives the
//! scheduler through [`SchedulerApi`].

pub mod client;
pub mod inbound;
pub mod outbound;

pub use client::{OrderServiceClient, UpstreamOrder};
pub use inbound::InboundBridge;
pub use outbound::OutboundBridge;

use async_trait::async_trait;
use common::{KitchenError, OrderPriority};
use store::models::{CreateOrder, Order};
use thiserror::Error;

/// Errors from upstream communication.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Network/HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success, non-retryable upstream status.
    #[error("upstream returned status {0}")]
    Status(u16),

    /// Transient failures outlasted the bounded retries.
    #[error("{0} failed after {1} attempts")]
    RetriesExhausted(String, u32),

    /// Upstream payload missing expected fields.
    #[error("malformed upstream payload: {0}")]
    Payload(String),

    /// Pub/sub channel error.
    #[error("pub/sub error: {0}")]
    PubSub(String),
}

impl From<BridgeError> for KitchenError {
    fn from(err: BridgeError) -> Self {
        KitchenError::UpstreamUnavailable(err.to_string())
    }
}

/// Scheduler operations the inbound bridge drives.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn add_order(&self, request: CreateOrder) -> Result<Order, KitchenError>;
    async fn cancel_order(&self, order_id: &str) -> Result<(), KitchenError>;
    async fn start_order(&self, order_id: &str) -> Result<(), KitchenError>;
    async fn reprioritize(
        &self,
        order_id: &str,
        priority: OrderPriority,
    ) -> Result<(), KitchenError>;
    async fn active_order_ids(&self) -> Result<Vec<String>, KitchenError>;
}
