//! Monitor task evicting nodes whose leases lapsed
//!
//! Any number of processes may run a monitor at the same time; sweeps are
//! atomic on the store and evicting an already removed node is a no-op.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::manager::MembershipManager;
use crate::metrics::MONITOR_FAILURES_TOTAL;
use crate::shutdown::ShutdownListener;
use crate::task::TaskHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub sweeps: u64,
    pub failed_sweeps: u64,
    pub evicted_total: u64,
    /// Node ids evicted by the latest sweep that evicted anything
    pub last_evicted: Vec<String>,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            state: MonitorState::Running,
            sweeps: 0,
            failed_sweeps: 0,
            evicted_total: 0,
            last_evicted: Vec::new(),
        }
    }
}

pub type MonitorHandle = TaskHandle<MonitorStatus>;

pub(crate) fn spawn(
    manager: MembershipManager,
    interval: Duration,
    mut shutdown: ShutdownListener,
) -> MonitorHandle {
    let status = Arc::new(RwLock::new(MonitorStatus::default()));
    let task_status = status.clone();

    let join = tokio::spawn(async move {
        info!(?interval, "Starting monitor");

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match manager.monitor_nodes().await {
                Ok(evicted) => {
                    let mut status = task_status.write();
                    status.sweeps += 1;
                    if !evicted.is_empty() {
                        status.evicted_total += evicted.len() as u64;
                        status.last_evicted = evicted;
                    }
                }
                Err(e) => {
                    task_status.write().failed_sweeps += 1;
                    counter!(MONITOR_FAILURES_TOTAL).increment(1);
                    warn!("Monitor sweep failed: {}", e);
                }
            }
        }

        task_status.write().state = MonitorState::Stopped;
        info!("Monitor stopped");
    });

    TaskHandle::new(status, join)
}
