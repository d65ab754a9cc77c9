//! Heartbeat task keeping one node's lease alive

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::manager::MembershipManager;
use crate::metrics::{HEARTBEAT_FAILURES_TOTAL, ORDINAL_CHANGES_TOTAL};
use crate::shutdown::ShutdownListener;
use crate::task::TaskHandle;

/// Heartbeat lifecycle. `Stopped` is terminal and only reached on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatState {
    Registered,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatStatus {
    pub node_id: String,
    pub state: HeartbeatState,
    /// Ordinal returned by the latest successful refresh
    pub ordinal: Option<u64>,
    pub successful_ticks: u64,
    pub failed_ticks: u64,
    pub consecutive_failures: u64,
    /// Wall-clock time of the latest successful refresh, epoch ms
    pub last_success_ms: Option<i64>,
}

impl HeartbeatStatus {
    fn new(node_id: String) -> Self {
        Self {
            node_id,
            state: HeartbeatState::Registered,
            ordinal: None,
            successful_ticks: 0,
            failed_ticks: 0,
            consecutive_failures: 0,
            last_success_ms: None,
        }
    }

    /// Record a refresh and return the previously known ordinal
    fn record_success(&mut self, ordinal: u64) -> Option<u64> {
        self.successful_ticks += 1;
        self.consecutive_failures = 0;
        self.last_success_ms = Some(chrono::Utc::now().timestamp_millis());
        self.ordinal.replace(ordinal)
    }

    fn record_failure(&mut self) -> u64 {
        self.failed_ticks += 1;
        self.consecutive_failures += 1;
        self.consecutive_failures
    }
}

pub type HeartbeatHandle = TaskHandle<HeartbeatStatus>;

pub(crate) fn spawn(
    manager: MembershipManager,
    node_id: String,
    interval: Duration,
    ttl: Duration,
    mut shutdown: ShutdownListener,
) -> HeartbeatHandle {
    let status = Arc::new(RwLock::new(HeartbeatStatus::new(node_id.clone())));
    let task_status = status.clone();

    let join = tokio::spawn(async move {
        info!(node_id = %node_id, ?interval, ?ttl, "Starting heartbeat");

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match manager.register_node(&node_id, ttl).await {
                Ok(ordinal) => {
                    let previous = task_status.write().record_success(ordinal);
                    if let Some(previous) = previous
                        && previous != ordinal
                    {
                        counter!(ORDINAL_CHANGES_TOTAL).increment(1);
                        warn!(
                            node_id = %node_id,
                            previous,
                            ordinal,
                            "Lease lapsed and the node was registered with a new ordinal"
                        );
                    }
                }
                Err(e) => {
                    let consecutive = task_status.write().record_failure();
                    counter!(HEARTBEAT_FAILURES_TOTAL).increment(1);
                    warn!(
                        node_id = %node_id,
                        consecutive_failures = consecutive,
                        "Heartbeat failed: {}", e
                    );
                }
            }
        }

        task_status.write().state = HeartbeatState::Stopped;
        info!(node_id = %node_id, "Heartbeat stopped");
    });

    TaskHandle::new(status, join)
}
