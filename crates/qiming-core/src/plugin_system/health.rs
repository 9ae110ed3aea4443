use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::plugin_system::container::SharedContainer;
use crate::plugin_system::traits::{HealthStatus, Plugin};

/// Result of probing one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub plugin_id: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The probe did not answer within its budget
    pub timed_out: bool,
}

async fn probe(plugin_id: String, plugin: Arc<dyn Plugin>, budget: Duration) -> HealthReport {
    let handle = tokio::spawn(async move { plugin.health_status().await });
    let (status, timed_out) = match tokio::time::timeout(budget, handle).await {
        Ok(Ok(status)) => (status, false),
        Ok(Err(join_error)) => (
            HealthStatus::unhealthy(format!("health probe failed: {join_error}")),
            false,
        ),
        Err(_) => (
            HealthStatus::unhealthy(format!("health probe timed out after {} ms", budget.as_millis())),
            true,
        ),
    };
    HealthReport {
        plugin_id,
        healthy: status.healthy,
        message: status.message,
        timed_out,
    }
}

/// Probe every registered plugin once and record the results.
///
/// Probes run without the container lock held. Individual probe failures are
/// logged and recorded, never returned as errors.
pub async fn run_health_checks(container: &SharedContainer, budget: Duration) -> Vec<HealthReport> {
    let targets = container.read().await.health_check_targets();
    let probes = targets
        .into_iter()
        .map(|(id, plugin)| probe(id, plugin, budget));
    let reports = futures::future::join_all(probes).await;

    let mut guard = container.write().await;
    for report in &reports {
        if report.healthy {
            log::debug!("Health check passed for '{}'", report.plugin_id);
        } else {
            log::warn!(
                "Health check failed for '{}': {}",
                report.plugin_id,
                report.message.as_deref().unwrap_or("unhealthy")
            );
        }
        // The plugin may have been unregistered while probes were in flight
        if let Err(e) = guard.record_health_check(&report.plugin_id, report.healthy, report.message.as_deref()) {
            log::debug!("Dropping health result for '{}': {}", report.plugin_id, e);
        }
    }
    reports
}

/// Background task running [`run_health_checks`] on a fixed interval.
pub struct HealthMonitor {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawn the monitor. The first sweep runs after one full interval.
    pub fn start(container: SharedContainer, interval: Duration, probe_budget: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            log::info!("Health monitor started, interval {} ms", interval.as_millis());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reports = run_health_checks(&container, probe_budget).await;
                        let unhealthy = reports.iter().filter(|r| !r.healthy).count();
                        log::debug!("Health sweep: {} probed, {} unhealthy", reports.len(), unhealthy);
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            log::info!("Health monitor stopped");
        });
        Self { stop_tx, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            log::warn!("Health monitor task ended abnormally: {}", e);
        }
    }
}
