//! Inbound bridge: upstream order events into scheduler operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{channels, KitchenError, OrderPriority, StationType};
use serde_json::Value;
use store::models::{CreateOrder, CreateOrderItem};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{BridgeError, SchedulerApi};

/// Consumes `events:order:*` channels and drives the scheduler.
pub struct InboundBridge {
    scheduler: Arc<dyn SchedulerApi>,
}

impl InboundBridge {
    pub fn new(scheduler: Arc<dyn SchedulerApi>) -> Self {
        Self { scheduler }
    }

    /// Stations a beverage needs, by menu name.
    pub fn station_requirements(beverage: &str) -> BTreeSet<StationType> {
        match beverage.to_ascii_lowercase().as_str() {
            "espresso" | "doppio" | "americano" => {
                BTreeSet::from([StationType::Espresso, StationType::Grinder])
            }
            "cappuccino" | "latte" | "flat white" | "macchiato" => BTreeSet::from([
                StationType::Espresso,
                StationType::Grinder,
                StationType::Steamer,
            ]),
            "mocha" | "frappuccino" => BTreeSet::from([
                StationType::Espresso,
                StationType::Grinder,
                StationType::Steamer,
                StationType::Assembly,
            ]),
            "cold brew" | "iced tea" => BTreeSet::from([StationType::Assembly]),
            _ => BTreeSet::from([StationType::Espresso, StationType::Grinder]),
        }
    }

    fn string_field<'a>(payload: &'a Value, names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|name| payload[*name].as_str())
    }

    /// Dispatch one upstream event; unknown channels are logged and ignored.
    pub async fn handle(&self, channel: &str, payload: &Value) -> Result<(), KitchenError> {
        match channel {
            channels::ORDER_CREATED => self.on_created(payload).await,
            channels::ORDER_CANCELLED => {
                let order_id = Self::order_id(payload)?;
                self.scheduler.cancel_order(order_id).await
            }
            channels::ORDER_PAYMENT_CONFIRMED => {
                let order_id = Self::order_id(payload)?;
                self.scheduler.start_order(order_id).await
            }
            channels::ORDER_UPDATED => self.on_updated(payload).await,
            other => {
                tracing::warn!(channel = %other, "unknown upstream event, ignoring");
                Ok(())
            }
        }
    }

    fn order_id(payload: &Value) -> Result<&str, KitchenError> {
        Self::string_field(payload, &["order_id", "id"]).ok_or_else(|| {
            KitchenError::InvalidInput("upstream event is missing an order id".into())
        })
    }

    async fn on_created(&self, payload: &Value) -> Result<(), KitchenError> {
        let order_id = Self::order_id(payload)?.to_string();
        let customer_id = Self::string_field(payload, &["customer_id", "customer"])
            .unwrap_or("unknown")
            .to_string();

        let raw_items = payload["items"].as_array().ok_or_else(|| {
            KitchenError::InvalidInput("upstream order has no items".into())
        })?;
        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            let name = Self::string_field(raw, &["name"])
                .ok_or_else(|| KitchenError::InvalidInput("upstream item has no name".into()))?;
            let quantity = raw["quantity"].as_u64().unwrap_or(1) as u32;
            items.push(CreateOrderItem {
                id: Some(
                    Self::string_field(raw, &["id", "item_id"])
                        .map(str::to_string)
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                ),
                name: name.to_string(),
                quantity,
                instructions: Self::string_field(raw, &["instructions"])
                    .unwrap_or_default()
                    .to_string(),
                requirements: Self::station_requirements(name),
                metadata: Default::default(),
            });
        }

        let priority = serde_json::from_value::<OrderPriority>(payload["priority"].clone()).ok();

        self.scheduler
            .add_order(CreateOrder {
                id: Some(order_id),
                customer_id,
                items,
                priority,
            })
            .await
            .map(|_| ())
    }

    async fn on_updated(&self, payload: &Value) -> Result<(), KitchenError> {
        let order_id = Self::order_id(payload)?;
        match serde_json::from_value::<OrderPriority>(payload["priority"].clone()) {
            Ok(priority) => self.scheduler.reprioritize(order_id, priority).await,
            Err(_) => {
                tracing::debug!(order_id = %order_id, "upstream update carries nothing actionable");
                Ok(())
            }
        }
    }

    /// Consume the upstream channels from Redis pub/sub until cancelled.
    pub async fn run(
        self: Arc<Self>,
        redis_url: String,
        cancel: CancellationToken,
    ) -> Result<(), BridgeError> {
        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| BridgeError::PubSub(format!("client: {e}")))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| BridgeError::PubSub(format!("connect: {e}")))?;
        for channel in channels::ALL {
            pubsub
                .subscribe(*channel)
                .await
                .map_err(|e| BridgeError::PubSub(format!("subscribe {channel}: {e}")))?;
        }
        tracing::info!(channels = ?channels::ALL, "inbound bridge subscribed");

        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = futures_lite::StreamExt::next(&mut stream) => {
                    let Some(message) = message else { break };
                    let channel = message.get_channel_name().to_string();
                    let payload: String = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::warn!(channel = %channel, error = %err, "unreadable upstream payload");
                            continue;
                        }
                    };
                    match serde_json::from_str::<Value>(&payload) {
                        Ok(value) => {
                            if let Err(err) = self.handle(&channel, &value).await {
                                tracing::warn!(channel = %channel, error = %err, "inbound event rejected");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(channel = %channel, error = %err, "upstream payload is not JSON");
                        }
                    }
                }
            }
        }

        tracing::info!("inbound bridge stopped");
        Ok(())
    }
}
