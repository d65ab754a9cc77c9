//! Member lifecycle
//!
//! connect, ping, register, heartbeat and optionally monitor, report the
//! assignment until shutdown, then stop the tasks, deregister and close.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use rollcall_membership::{
    HeartbeatHandle, MembershipConfig, MembershipManager, MonitorHandle, ShutdownSignal,
    metrics::describe_metrics,
};
use rollcall_store::{AtomicStore, StoreBuilder};

use crate::config::AgentConfig;

/// Serve Prometheus metrics on `addr` and register metric descriptions
pub fn install_metrics_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to start metrics exporter on {}", addr))?;
    describe_metrics();
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// A registered member with its background tasks running
pub struct Agent {
    config: AgentConfig,
    manager: MembershipManager,
    shutdown: ShutdownSignal,
    heartbeat: HeartbeatHandle,
    monitor: Option<MonitorHandle>,
}

impl Agent {
    /// Open the configured store and start the member
    pub async fn start(config: AgentConfig, shutdown: ShutdownSignal) -> anyhow::Result<Self> {
        let store = StoreBuilder::new()
            .backend(&config.storage.backend)
            .namespace(&config.storage.namespace)
            .redis_url(config.storage.redis.url())
            .connect_timeout(config.connect_timeout())
            .build()
            .await
            .context("failed to open membership store")?;

        Self::with_store(config, store, shutdown).await
    }

    /// Start the member on an already opened store. The store is closed if
    /// registration fails.
    pub async fn with_store(
        config: AgentConfig,
        store: Arc<dyn AtomicStore>,
        shutdown: ShutdownSignal,
    ) -> anyhow::Result<Self> {
        let manager = MembershipManager::with_config(
            store,
            MembershipConfig {
                request_timeout: config.request_timeout(),
            },
        );

        if let Err(e) = Self::register(&config, &manager).await {
            if let Err(close_err) = manager.close().await {
                warn!(
                    "Failed to close membership store after registration failure: {}",
                    close_err
                );
            }
            return Err(e);
        }

        let heartbeat = manager.start_heartbeat(
            config.node_id(),
            config.heartbeat_interval(),
            config.ttl(),
            &shutdown,
        )?;
        let monitor = if config.monitor.enabled {
            Some(manager.start_monitor(config.monitor_interval(), &shutdown)?)
        } else {
            info!("Monitor disabled on this node");
            None
        };

        Ok(Self {
            config,
            manager,
            shutdown,
            heartbeat,
            monitor,
        })
    }

    async fn register(config: &AgentConfig, manager: &MembershipManager) -> anyhow::Result<()> {
        manager
            .ping(None)
            .await
            .context("membership store is unreachable")?;

        let ordinal = manager
            .register_node(config.node_id(), config.ttl())
            .await
            .with_context(|| format!("failed to register node '{}'", config.node_id()))?;

        info!(
            node_id = config.node_id(),
            ordinal,
            backend = manager.store().backend(),
            namespace = %config.storage.namespace,
            "Node registered"
        );
        Ok(())
    }

    pub fn manager(&self) -> &MembershipManager {
        &self.manager
    }

    pub fn node_id(&self) -> &str {
        self.config.node_id()
    }

    /// Report the assignment periodically until shutdown, then stop cleanly
    pub async fn run(self) -> anyhow::Result<()> {
        let mut listener = self.shutdown.subscribe();
        let interval = self.config.report_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = listener.cancelled() => break,
                _ = ticker.tick() => self.report().await,
            }
        }

        self.stop().await
    }

    async fn report(&self) {
        match self.manager.get_node_info(self.node_id()).await {
            Ok(info) => info!(
                node_id = self.node_id(),
                ordinal = info.ordinal,
                total = info.total,
                "Current assignment"
            ),
            Err(e) => warn!(node_id = self.node_id(), "Failed to read assignment: {}", e),
        }
    }

    async fn stop(self) -> anyhow::Result<()> {
        info!("Stopping membership tasks");
        self.shutdown.shutdown();

        let heartbeat = self.heartbeat.join().await;
        info!(
            successful_ticks = heartbeat.successful_ticks,
            failed_ticks = heartbeat.failed_ticks,
            "Heartbeat stopped"
        );
        if let Some(monitor) = self.monitor {
            let monitor = monitor.join().await;
            info!(
                sweeps = monitor.sweeps,
                evicted = monitor.evicted_total,
                "Monitor stopped"
            );
        }

        if let Err(e) = self.manager.deregister_node(self.config.node_id()).await {
            warn!(node_id = self.config.node_id(), "Failed to deregister: {}", e);
        }

        self.manager
            .close()
            .await
            .context("failed to close membership store")?;
        info!("Agent stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use rollcall_common::{Result, RollcallError};
    use rollcall_store::{MemoryStore, Reply, StoreOp};

    use crate::config::NodeSection;

    fn config(node_id: &str) -> AgentConfig {
        let mut config = AgentConfig {
            node: NodeSection {
                id: node_id.to_string(),
                ttl_secs: 3,
                heartbeat_interval_ms: 1000,
                report_interval_ms: 2000,
            },
            ..Default::default()
        };
        config.storage.backend = "memory".to_string();
        config.monitor.interval_ms = 1000;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let shutdown = ShutdownSignal::new();

        let agent = Agent::with_store(config("worker-a"), store.clone(), shutdown.clone())
            .await
            .unwrap();
        assert_eq!(agent.node_id(), "worker-a");
        let manager = agent.manager().clone();
        let running = tokio::spawn(agent.run());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let info = manager.get_node_info("worker-a").await.unwrap();
        assert_eq!((info.ordinal, info.total), (0, 1));

        shutdown.shutdown();
        running.await.unwrap().unwrap();

        assert!(store.is_empty());
        assert!(manager.ping(None).await.unwrap_err().is_transport());
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_evicts_silent_peer() {
        let store = Arc::new(MemoryStore::new());
        let shutdown = ShutdownSignal::new();

        let agent = Agent::with_store(config("worker-a"), store.clone(), shutdown.clone())
            .await
            .unwrap();
        agent
            .manager()
            .register_node("crashed", Duration::from_secs(2))
            .await
            .unwrap();
        let running = tokio::spawn(agent.run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            store.ordinals().into_keys().collect::<Vec<_>>(),
            vec!["worker-a".to_string()]
        );

        shutdown.shutdown();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_agent_fails_fast_on_closed_store() {
        let store = Arc::new(MemoryStore::new());
        store.close().await.unwrap();

        let err = Agent::with_store(config("worker-a"), store, ShutdownSignal::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("unreachable"));
    }

    /// Store that is unreachable and also fails to close
    struct BrokenStore;

    #[async_trait]
    impl AtomicStore for BrokenStore {
        async fn execute(&self, _op: StoreOp<'_>) -> Result<Reply> {
            Err(RollcallError::Transport("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<()> {
            Err(RollcallError::Transport("connection refused".to_string()))
        }

        async fn close(&self) -> Result<()> {
            Err(RollcallError::Transport("close on broken pipe".to_string()))
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_registration_error_survives_close_failure() {
        let err = Agent::with_store(config("worker-a"), Arc::new(BrokenStore), ShutdownSignal::new())
            .await
            .err()
            .unwrap();
        let message = format!("{:#}", err);
        assert!(message.contains("unreachable"), "{}", message);
        assert!(!message.contains("broken pipe"), "{}", message);
    }

    #[tokio::test]
    async fn test_start_with_memory_backend() {
        let shutdown = ShutdownSignal::new();
        let agent = Agent::start(config("worker-b"), shutdown.clone())
            .await
            .unwrap();
        let manager = agent.manager().clone();

        shutdown.shutdown();
        agent.run().await.unwrap();
        assert!(manager.get_node_info("worker-b").await.unwrap_err().is_transport());
    }
}
