//! In-process publish/subscribe for domain events.
//!
//! Each subscriber owns a bounded mailbox; publishing never blocks on a slow
//! subscriber. Overflowing mailboxes drop the event and log it, so consumers
//! must be able to resync from the store.

use common::{matches_pattern, KitchenEvent};
use tokio::sync::{mpsc, RwLock};

/// Default per-subscriber mailbox depth.
const DEFAULT_MAILBOX: usize = 64;

struct Subscriber {
    name: String,
    patterns: Vec<String>,
    tx: mpsc::Sender<KitchenEvent>,
}

/// Event bus keyed by dotted event-type patterns.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    mailbox: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_mailbox(DEFAULT_MAILBOX)
    }

    pub fn with_mailbox(mailbox: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            mailbox,
        }
    }

    /// Register a subscriber for the given type patterns.
    ///
    /// Re-subscribing under the same name replaces the previous registration
    /// and closes its mailbox.
    pub async fn subscribe(
        &self,
        name: &str,
        patterns: &[&str],
    ) -> mpsc::Receiver<KitchenEvent> {
        let (tx, rx) = mpsc::channel(self.mailbox);
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|subscriber| subscriber.name != name);
        subscribers.push(Subscriber {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            tx,
        });
        tracing::debug!(subscriber = %name, patterns = ?patterns, "subscribed");
        rx
    }

    pub async fn unsubscribe(&self, name: &str) {
        self.subscribers
            .write()
            .await
            .retain(|subscriber| subscriber.name != name);
    }

    /// Deliver an event to every matching subscriber, in publisher order.
    pub async fn publish(&self, event: KitchenEvent) {
        let mut closed: Vec<String> = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for subscriber in subscribers.iter() {
                let interested = subscriber
                    .patterns
                    .iter()
                    .any(|pattern| matches_pattern(&event.event_type, pattern));
                if !interested {
                    continue;
                }

                match subscriber.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscriber = %subscriber.name,
                            event_type = %event.event_type,
                            "subscriber mailbox full, dropping event"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        closed.push(subscriber.name.clone());
                    }
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            subscribers.retain(|subscriber| !closed.contains(&subscriber.name));
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}
