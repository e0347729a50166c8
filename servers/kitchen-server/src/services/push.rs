//! Push channel: long-lived WebSocket fan-out of domain events.
//!
//! Each client owns a bounded outbound mailbox; a full mailbox drops the
//! frame rather than stalling the pump. The server pings every 54 seconds
//! and disconnects clients silent for more than 60.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use common::{matches_pattern, KitchenEvent};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::scheduler::KitchenService;

const PING_INTERVAL: Duration = Duration::from_secs(54);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const CLIENT_MAILBOX: usize = 64;

/// Subscription default when a client subscribes without naming events.
const DEFAULT_PATTERN: &str = "kitchen.*";

struct ClientHandle {
    tx: mpsc::Sender<Message>,
    subscriptions: HashSet<String>,
    last_seen: Instant,
}

/// Registry of connected push clients.
#[derive(Default)]
pub struct PushManager {
    clients: RwLock<HashMap<Uuid, ClientHandle>>,
}

impl PushManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register(&self, client_id: Uuid, tx: mpsc::Sender<Message>) {
        self.clients.write().await.insert(
            client_id,
            ClientHandle {
                tx,
                subscriptions: HashSet::new(),
                last_seen: Instant::now(),
            },
        );
        tracing::info!(client_id = %client_id, "push client connected");
    }

    /// Remove a client; dropping the stored sender closes its mailbox. The
    /// map entry guards against double-closing.
    async fn remove(&self, client_id: Uuid) -> bool {
        let removed = self.clients.write().await.remove(&client_id).is_some();
        if removed {
            tracing::info!(client_id = %client_id, "push client disconnected");
        }
        removed
    }

    async fn touch(&self, client_id: Uuid) {
        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    async fn idle_for(&self, client_id: Uuid) -> Duration {
        self.clients
            .read()
            .await
            .get(&client_id)
            .map(|client| client.last_seen.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    async fn subscribe(&self, client_id: Uuid, patterns: Vec<String>) {
        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            if patterns.is_empty() {
                client.subscriptions.insert(DEFAULT_PATTERN.to_string());
            } else {
                client.subscriptions.extend(patterns);
            }
        }
    }

    async fn unsubscribe(&self, client_id: Uuid, patterns: Vec<String>) {
        if let Some(client) = self.clients.write().await.get_mut(&client_id) {
            if patterns.is_empty() {
                client.subscriptions.clear();
            } else {
                for pattern in patterns {
                    client.subscriptions.remove(&pattern);
                }
            }
        }
    }

    /// Fan an event frame out to every subscribed client.
    pub async fn broadcast_event(&self, event: &KitchenEvent) {
        let frame = json!({
            "type": "event",
            "event": event.event_type,
            "data": event.data,
            "timestamp": event.occurred_at,
        })
        .to_string();

        let mut gone: Vec<Uuid> = Vec::new();
        {
            let clients = self.clients.read().await;
            for (client_id, client) in clients.iter() {
                let interested = client
                    .subscriptions
                    .iter()
                    .any(|pattern| matches_pattern(&event.event_type, pattern));
                if !interested {
                    continue;
                }

                match client.tx.try_send(Message::Text(frame.clone())) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            client_id = %client_id,
                            event_type = %event.event_type,
                            "push mailbox full, dropping frame"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => gone.push(*client_id),
                }
            }
        }
        for client_id in gone {
            self.remove(client_id).await;
        }
    }

    /// Forward bus events into the registry until cancelled.
    pub async fn run_pump(
        self: Arc<Self>,
        mut events: mpsc::Receiver<KitchenEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else { break };
                    self.broadcast_event(&event).await;
                }
            }
        }
        tracing::info!("push pump stopped");
    }
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    events: Vec<String>,
}

fn reply(kind: &str, data: Value) -> Message {
    Message::Text(
        json!({
            "type": kind,
            "data": data,
            "timestamp": Utc::now(),
        })
        .to_string(),
    )
}

/// Drive one accepted WebSocket connection to its end.
pub async fn handle_socket(
    manager: Arc<PushManager>,
    service: Arc<KitchenService>,
    socket: WebSocket,
) {
    let client_id = Uuid::new_v4();
    let (tx, mut outbound) = mpsc::channel::<Message>(CLIENT_MAILBOX);
    manager.register(client_id, tx.clone()).await;

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Greeting, then the current queue status.
    let _ = tx
        .send(reply(
            "connection",
            json!({"event": "connection/connected", "client_id": client_id}),
        ))
        .await;
    match service.queue_overview().await {
        Ok(overview) => {
            let _ = tx
                .send(reply(
                    "queue_status",
                    serde_json::to_value(&overview).unwrap_or(Value::Null),
                ))
                .await;
        }
        Err(err) => tracing::warn!(error = %err, "could not send initial queue status"),
    }

    let mut ping = interval(PING_INTERVAL);
    ping.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        manager.touch(client_id).await;
                        handle_client_message(&manager, &service, client_id, &tx, &text).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                        manager.touch(client_id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(client_id = %client_id, error = %err, "socket error");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if manager.idle_for(client_id).await > IDLE_TIMEOUT {
                    tracing::info!(client_id = %client_id, "push client timed out");
                    break;
                }
                if tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    manager.remove(client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(
    manager: &Arc<PushManager>,
    service: &Arc<KitchenService>,
    client_id: Uuid,
    tx: &mpsc::Sender<Message>,
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            let _ = tx
                .send(reply("error", json!({"message": format!("bad frame: {err}")})))
                .await;
            return;
        }
    };

    match message.kind.as_str() {
        "subscribe" => {
            manager.subscribe(client_id, message.events.clone()).await;
            let _ = tx
                .send(reply("subscribed", json!({"events": message.events})))
                .await;
        }
        "unsubscribe" => {
            manager.unsubscribe(client_id, message.events.clone()).await;
            let _ = tx
                .send(reply("unsubscribed", json!({"events": message.events})))
                .await;
        }
        "ping" => {
            let _ = tx.send(reply("pong", Value::Null)).await;
        }
        "get_queue_status" => match service.queue_overview().await {
            Ok(overview) => {
                let _ = tx
                    .send(reply(
                        "queue_status",
                        serde_json::to_value(&overview).unwrap_or(Value::Null),
                    ))
                    .await;
            }
            Err(err) => {
                let _ = tx
                    .send(reply("error", json!({"message": err.to_string()})))
                    .await;
            }
        },
        "get_next_order" => {
            let next = service.next_order().await;
            let _ = tx
                .send(reply(
                    "next_order",
                    serde_json::to_value(&next).unwrap_or(Value::Null),
                ))
                .await;
        }
        other => {
            let _ = tx
                .send(reply(
                    "error",
                    json!({"message": format!("unknown message type: {other}")}),
                ))
                .await;
        }
    }
}
