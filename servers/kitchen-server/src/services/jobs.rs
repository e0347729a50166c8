//! Background loops: rebalance, overdue sweep and upstream sync.
//!
//! One task per loop; each waits on its tick and on the cancellation token
//! and observes cancellation at tick boundaries.

use std::sync::Arc;
use std::time::Duration;

use bridge::{OrderServiceClient, SchedulerApi};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use super::scheduler::KitchenService;

/// Background-loop configuration.
#[derive(Clone)]
pub struct JobsConfig {
    pub enabled: bool,
    /// Starvation-promotion and reconciliation cadence (seconds).
    pub rebalance_interval_secs: u64,
    /// Overdue sweep cadence (seconds).
    pub overdue_interval_secs: u64,
    /// Upstream sync cadence (seconds).
    pub sync_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rebalance_interval_secs: 60,
            overdue_interval_secs: 30,
            sync_interval_secs: 30,
        }
    }
}

/// Counters for loop activity.
#[derive(Debug, Default, Clone)]
pub struct JobsMetrics {
    pub promotions: u64,
    pub overdue_events: u64,
    pub staff_reconciled: u64,
    pub sync_runs: u64,
    pub errors: u64,
}

/// Owner of the background tasks.
pub struct KitchenJobs {
    service: Arc<KitchenService>,
    upstream: Option<Arc<OrderServiceClient>>,
    config: JobsConfig,
    metrics: std::sync::Mutex<JobsMetrics>,
}

impl KitchenJobs {
    pub fn new(
        service: Arc<KitchenService>,
        upstream: Option<Arc<OrderServiceClient>>,
        config: JobsConfig,
    ) -> Self {
        Self {
            service,
            upstream,
            config,
            metrics: std::sync::Mutex::new(JobsMetrics::default()),
        }
    }

    pub fn metrics(&self) -> JobsMetrics {
        self.metrics.lock().expect("jobs metrics poisoned").clone()
    }

    fn bump(&self, apply: impl FnOnce(&mut JobsMetrics)) {
        apply(&mut self.metrics.lock().expect("jobs metrics poisoned"));
    }

    /// Spawn the loops; they stop at the next tick after cancellation.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        if !self.config.enabled {
            tracing::info!("background jobs disabled");
            return Vec::new();
        }

        tracing::info!(
            rebalance_secs = self.config.rebalance_interval_secs,
            overdue_secs = self.config.overdue_interval_secs,
            sync_secs = self.config.sync_interval_secs,
            upstream = self.upstream.is_some(),
            "starting background jobs"
        );

        let mut handles = Vec::new();

        let jobs = self.clone();
        let token = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(jobs.config.rebalance_interval_secs));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => jobs.run_rebalance().await,
                }
            }
        }));

        let jobs = self.clone();
        let token = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(jobs.config.overdue_interval_secs));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => jobs.run_overdue_sweep().await,
                }
            }
        }));

        if self.upstream.is_some() {
            let jobs = self.clone();
            let token = cancel;
            handles.push(tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(jobs.config.sync_interval_secs));
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => jobs.run_upstream_sync().await,
                    }
                }
            }));
        }

        handles
    }

    /// Promote starving orders, then repair staff counters.
    async fn run_rebalance(&self) {
        match self.service.rebalance_queue().await {
            Ok(promoted) if promoted > 0 => {
                tracing::info!(promoted = promoted, "rebalance promoted starving orders");
                self.bump(|m| m.promotions += promoted);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "rebalance failed");
                self.bump(|m| m.errors += 1);
            }
        }

        match self.service.reconcile_staff_counters().await {
            Ok(repaired) if repaired > 0 => self.bump(|m| m.staff_reconciled += repaired),
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "staff reconciliation failed");
                self.bump(|m| m.errors += 1);
            }
        }
    }

    async fn run_overdue_sweep(&self) {
        match self.service.sweep_overdue().await {
            Ok(emitted) if emitted > 0 => self.bump(|m| m.overdue_events += emitted),
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "overdue sweep failed");
                self.bump(|m| m.errors += 1);
            }
        }
    }

    /// Poll upstream state for active orders and reconcile transitions.
    async fn run_upstream_sync(&self) {
        let Some(client) = &self.upstream else { return };

        let ids = match self.service.active_order_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(error = %err, "upstream sync could not list active orders");
                self.bump(|m| m.errors += 1);
                return;
            }
        };

        for order_id in ids {
            let upstream = match client.fetch_order(&order_id).await {
                Ok(Some(order)) => order,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(order_id = %order_id, error = %err, "upstream fetch failed");
                    self.bump(|m| m.errors += 1);
                    continue;
                }
            };

            let result = match upstream.status.as_str() {
                "cancelled" => self.service.cancel_order(&order_id).await,
                "paid" | "payment_confirmed" => {
                    self.service.start_order(&order_id).await.map(|_| ())
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                // Usually a transition the local side already made.
                tracing::debug!(order_id = %order_id, error = %err, "sync transition skipped");
            }
        }

        self.bump(|m| m.sync_runs += 1);
    }
}
