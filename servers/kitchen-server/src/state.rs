//! Application state.

use std::sync::Arc;

use store::KvHandle;

use crate::services::{EventBus, KitchenService, PushManager};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<KitchenService>,
    pub bus: Arc<EventBus>,
    pub push: Arc<PushManager>,
}

impl AppState {
    /// Create a new AppState over the given store backend.
    pub fn new(kv: KvHandle) -> Self {
        let bus = Arc::new(EventBus::new());
        let service = Arc::new(KitchenService::new(kv, bus.clone()));
        let push = Arc::new(PushManager::new());

        Self { service, bus, push }
    }
}
