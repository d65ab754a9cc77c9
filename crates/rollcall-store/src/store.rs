//! The atomic store seam.
//!
//! Every membership operation is a single [`AtomicStore::execute`] call. The
//! store runs the whole operation as one atomic unit, so callers never compose
//! a check-and-mutate sequence out of separate round trips.

use async_trait::async_trait;

use rollcall_common::{MAX_TTL_SECS, Result, RollcallError};

use crate::reply::Reply;

/// A named atomic operation against the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp<'a> {
    /// Refresh the node's lease, or allocate the smallest free ordinal.
    /// Replies with the ordinal as an integer.
    RegisterOrRefresh { node_id: &'a str, ttl_secs: u64 },
    /// Delete the node's record. Replies with the number of records removed.
    Deregister { node_id: &'a str },
    /// Replies `["ok", ordinal, total]`, `["not_found"]` or `["error", message]`.
    GetNodeInfo { node_id: &'a str },
    /// Evict every record whose lease expired by the store's clock.
    /// Replies with the evicted node ids.
    Monitor,
}

impl StoreOp<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            StoreOp::RegisterOrRefresh { .. } => "register_or_refresh",
            StoreOp::Deregister { .. } => "deregister",
            StoreOp::GetNodeInfo { .. } => "get_node_info",
            StoreOp::Monitor => "monitor",
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            StoreOp::RegisterOrRefresh { node_id, .. }
            | StoreOp::Deregister { node_id }
            | StoreOp::GetNodeInfo { node_id } => Some(*node_id),
            StoreOp::Monitor => None,
        }
    }

    /// Reject lease lengths the backends cannot represent. Stores call this
    /// before touching the registry.
    pub fn check_ttl(&self) -> Result<()> {
        if let StoreOp::RegisterOrRefresh { ttl_secs, .. } = *self
            && !(1..=MAX_TTL_SECS).contains(&ttl_secs)
        {
            return Err(RollcallError::InvalidArgument(format!(
                "ttl of {} seconds is outside 1..={}",
                ttl_secs, MAX_TTL_SECS
            )));
        }
        Ok(())
    }
}

/// Store adapter trait
///
/// Implementations must execute each [`StoreOp`] atomically with respect to
/// every other operation on the same registry, from any process.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Execute one atomic operation and return its raw reply
    async fn execute(&self, op: StoreOp<'_>) -> Result<Reply>;

    /// Round-trip liveness check
    async fn ping(&self) -> Result<()>;

    /// Release the connection. Later calls fail with a transport error.
    async fn close(&self) -> Result<()>;

    /// Backend name for logging
    fn backend(&self) -> &'static str;
}
