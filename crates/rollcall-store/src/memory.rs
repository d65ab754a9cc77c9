//! In-process store implementation
//!
//! Runs the registry protocol behind a single mutex, producing exactly the
//! reply shapes the Redis scripts produce. Leases are measured with
//! `tokio::time::Instant`, so a paused test runtime controls expiry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use rollcall_common::{Result, RollcallError};

use crate::BACKEND_MEMORY;
use crate::reply::Reply;
use crate::store::{AtomicStore, StoreOp};

struct Lease {
    ordinal: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Registry {
    leases: HashMap<String, Lease>,
    closed: bool,
}

impl Registry {
    fn register_or_refresh(
        &mut self,
        node_id: &str,
        ttl_secs: u64,
        now: Instant,
    ) -> Result<Reply> {
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs))
            .ok_or_else(|| {
                RollcallError::InvalidArgument(format!(
                    "ttl of {} seconds overflows the store clock",
                    ttl_secs
                ))
            })?;

        if let Some(lease) = self.leases.get_mut(node_id) {
            lease.expires_at = expires_at;
            return Ok(Reply::Integer(lease.ordinal as i64));
        }

        let taken: HashSet<u64> = self.leases.values().map(|l| l.ordinal).collect();
        let mut ordinal = 0;
        while taken.contains(&ordinal) {
            ordinal += 1;
        }

        self.leases.insert(
            node_id.to_string(),
            Lease {
                ordinal,
                expires_at,
            },
        );
        Ok(Reply::Integer(ordinal as i64))
    }

    fn deregister(&mut self, node_id: &str) -> Reply {
        let removed = self.leases.remove(node_id).is_some();
        Reply::Integer(i64::from(removed))
    }

    fn get_node_info(&self, node_id: &str) -> Reply {
        let Some(lease) = self.leases.get(node_id) else {
            return Reply::Array(vec![Reply::text("not_found")]);
        };

        let total = self.leases.len() as u64;
        if lease.ordinal >= total {
            return Reply::Array(vec![
                Reply::text("error"),
                Reply::Text(format!(
                    "ordinal {} is outside the {} live nodes",
                    lease.ordinal, total
                )),
            ]);
        }

        Reply::Array(vec![
            Reply::text("ok"),
            Reply::Integer(lease.ordinal as i64),
            Reply::Integer(total as i64),
        ])
    }

    fn monitor(&mut self, now: Instant) -> Reply {
        let mut expired: Vec<(Instant, String)> = self
            .leases
            .iter()
            .filter(|(_, lease)| lease.expires_at <= now)
            .map(|(node_id, lease)| (lease.expires_at, node_id.clone()))
            .collect();
        expired.sort();

        for (_, node_id) in &expired {
            self.leases.remove(node_id);
        }

        Reply::Array(
            expired
                .into_iter()
                .map(|(_, node_id)| Reply::Text(node_id))
                .collect(),
        )
    }
}

/// Single-process registry
#[derive(Default)]
pub struct MemoryStore {
    registry: Mutex<Registry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.registry.lock().leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of node id to ordinal
    pub fn ordinals(&self) -> BTreeMap<String, u64> {
        self.registry
            .lock()
            .leases
            .iter()
            .map(|(node_id, lease)| (node_id.clone(), lease.ordinal))
            .collect()
    }

    /// Time left on a node's lease, zero once expired
    pub fn remaining_ttl(&self, node_id: &str) -> Option<Duration> {
        self.registry
            .lock()
            .leases
            .get(node_id)
            .map(|lease| lease.expires_at.saturating_duration_since(Instant::now()))
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn execute(&self, op: StoreOp<'_>) -> Result<Reply> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(RollcallError::Transport(
                "memory store is closed".to_string(),
            ));
        }

        op.check_ttl()?;
        let now = Instant::now();
        let reply = match op {
            StoreOp::RegisterOrRefresh { node_id, ttl_secs } => {
                registry.register_or_refresh(node_id, ttl_secs, now)?
            }
            StoreOp::Deregister { node_id } => registry.deregister(node_id),
            StoreOp::GetNodeInfo { node_id } => registry.get_node_info(node_id),
            StoreOp::Monitor => registry.monitor(now),
        };

        debug!(operation = op.name(), reply = %reply, "Executed memory store operation");
        Ok(reply)
    }

    async fn ping(&self) -> Result<()> {
        if self.registry.lock().closed {
            return Err(RollcallError::Transport(
                "memory store is closed".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.registry.lock().closed = true;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        BACKEND_MEMORY
    }
}
