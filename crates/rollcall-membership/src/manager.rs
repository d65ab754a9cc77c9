//! Membership API over an atomic store

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tracing::{debug, error, info};

use rollcall_common::{
    DEFAULT_REQUEST_TIMEOUT_MS, Result, RollcallError, ttl_to_secs, validate_interval,
    validate_node_id,
};
use rollcall_store::{AtomicStore, Reply, StoreOp};

use crate::decode::{decode_evicted, decode_node_info, decode_ordinal, decode_removed};
use crate::heartbeat::{self, HeartbeatHandle};
use crate::metrics::{CLUSTER_SIZE, EVICTIONS_TOTAL, LEASE_REFRESHES_TOTAL};
use crate::model::NodeInfo;
use crate::monitor::{self, MonitorHandle};
use crate::shutdown::ShutdownSignal;

/// Client-side settings for membership calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipConfig {
    /// Upper bound for one store round trip, and the default ping deadline
    pub request_timeout: Duration,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

/// Registers, refreshes and evicts nodes through an [`AtomicStore`].
///
/// Cloning is cheap and clones share the store handle.
#[derive(Clone)]
pub struct MembershipManager {
    store: Arc<dyn AtomicStore>,
    config: MembershipConfig,
}

impl fmt::Debug for MembershipManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipManager")
            .field("backend", &self.store.backend())
            .field("config", &self.config)
            .finish()
    }
}

impl MembershipManager {
    pub fn new(store: Arc<dyn AtomicStore>) -> Self {
        Self::with_config(store, MembershipConfig::default())
    }

    pub fn with_config(store: Arc<dyn AtomicStore>, config: MembershipConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn AtomicStore> {
        &self.store
    }

    pub fn config(&self) -> &MembershipConfig {
        &self.config
    }

    /// Register `node_id`, or refresh its lease if it is already registered.
    ///
    /// Returns the node's ordinal. A refresh never changes the ordinal; a node
    /// whose record was evicted is registered afresh and may get a new one.
    /// Sub-second ttls are rounded up to whole seconds.
    pub async fn register_node(&self, node_id: &str, ttl: Duration) -> Result<u64> {
        validate_node_id(node_id)?;
        let ttl_secs = ttl_to_secs(ttl)?;

        let op = StoreOp::RegisterOrRefresh { node_id, ttl_secs };
        let reply = self.call(op).await?;
        let ordinal = decode_ordinal(&reply).into_result(op.name(), node_id)?;

        counter!(LEASE_REFRESHES_TOTAL).increment(1);
        debug!(node_id, ordinal, ttl_secs, "Lease refreshed");
        Ok(ordinal)
    }

    /// Remove `node_id` from the registry. Removing an absent node succeeds.
    pub async fn deregister_node(&self, node_id: &str) -> Result<()> {
        validate_node_id(node_id)?;

        let op = StoreOp::Deregister { node_id };
        let reply = self.call(op).await?;
        let removed = decode_removed(&reply).into_result(op.name(), node_id)?;

        if removed {
            info!(node_id, "Node deregistered");
        } else {
            debug!(node_id, "Deregistered node was not registered");
        }
        Ok(())
    }

    /// Read the node's ordinal together with the current live node count
    pub async fn get_node_info(&self, node_id: &str) -> Result<NodeInfo> {
        validate_node_id(node_id)?;

        let op = StoreOp::GetNodeInfo { node_id };
        let reply = self.call(op).await?;
        let info = decode_node_info(&reply).into_result(op.name(), node_id)?;

        gauge!(CLUSTER_SIZE).set(info.total as f64);
        Ok(info)
    }

    /// Run one eviction sweep and return the evicted node ids, oldest lease first
    pub async fn monitor_nodes(&self) -> Result<Vec<String>> {
        let op = StoreOp::Monitor;
        let reply = self.call(op).await?;
        let evicted = decode_evicted(&reply).into_result(op.name(), "")?;

        if !evicted.is_empty() {
            counter!(EVICTIONS_TOTAL).increment(evicted.len() as u64);
            info!(count = evicted.len(), evicted = ?evicted, "Evicted expired nodes");
        }
        Ok(evicted)
    }

    /// Round trip to the store, bounded by `deadline` or the request timeout
    pub async fn ping(&self, deadline: Option<Duration>) -> Result<()> {
        let deadline = deadline.unwrap_or(self.config.request_timeout);

        let result = with_deadline("ping", deadline, self.store.ping()).await;
        if let Err(e) = &result {
            error!("Store ping failed: {}", e);
        }
        result
    }

    /// Spawn the heartbeat loop refreshing `node_id` every `interval`.
    ///
    /// The first refresh happens one interval after the call; register the
    /// node beforehand to obtain an ordinal immediately.
    pub fn start_heartbeat(
        &self,
        node_id: &str,
        interval: Duration,
        ttl: Duration,
        shutdown: &ShutdownSignal,
    ) -> Result<HeartbeatHandle> {
        validate_node_id(node_id)?;
        validate_interval("heartbeat interval", interval)?;
        ttl_to_secs(ttl)?;

        Ok(heartbeat::spawn(
            self.clone(),
            node_id.to_string(),
            interval,
            ttl,
            shutdown.subscribe(),
        ))
    }

    /// Spawn the monitor loop sweeping expired nodes every `interval`
    pub fn start_monitor(
        &self,
        interval: Duration,
        shutdown: &ShutdownSignal,
    ) -> Result<MonitorHandle> {
        validate_interval("monitor interval", interval)?;

        Ok(monitor::spawn(self.clone(), interval, shutdown.subscribe()))
    }

    /// Close the store handle. Later calls fail with a transport error.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    async fn call(&self, op: StoreOp<'_>) -> Result<Reply> {
        with_deadline(op.name(), self.config.request_timeout, self.store.execute(op)).await
    }
}

async fn with_deadline<T>(
    operation: &str,
    deadline: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| {
            RollcallError::Transport(format!("{} timed out after {:?}", operation, deadline))
        })?
}
