//! Outbound bridge: domain events into upstream order-service calls.

use std::sync::Arc;

use common::{event_types, KitchenEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{BridgeError, OrderServiceClient};

/// Forwards completed/status-changed events upstream.
///
/// Failures are logged and dropped: the local write already stands, and the
/// periodic sync loop re-converges both sides.
pub struct OutboundBridge {
    client: Arc<OrderServiceClient>,
}

impl OutboundBridge {
    pub fn new(client: Arc<OrderServiceClient>) -> Self {
        Self { client }
    }

    /// Translate a single domain event; unhandled types are no-ops.
    pub async fn handle(&self, event: &KitchenEvent) -> Result<(), BridgeError> {
        match event.event_type.as_str() {
            event_types::ORDER_STATUS_CHANGED => {
                let new_status = event.data["new_status"].as_str().ok_or_else(|| {
                    BridgeError::Payload("status_changed event without new_status".into())
                })?;
                self.client
                    .update_order_status(&event.aggregate_id, new_status)
                    .await
            }
            event_types::ORDER_COMPLETED => {
                let actual = event.data["actual_time"].as_i64().unwrap_or(0);
                self.client
                    .notify_completed(&event.aggregate_id, actual)
                    .await
            }
            _ => Ok(()),
        }
    }

    /// Drain the bus subscription until cancelled or the bus goes away.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<KitchenEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else { break };
                    if let Err(err) = self.handle(&event).await {
                        tracing::warn!(
                            event_type = %event.event_type,
                            aggregate_id = %event.aggregate_id,
                            error = %err,
                            "upstream notification failed; local write stands"
                        );
                    }
                }
            }
        }
        tracing::info!("outbound bridge stopped");
    }
}
