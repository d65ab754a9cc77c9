//! Argument validation shared by every entry point that talks to the store.
//!
//! Checks run before any round trip so a bad argument never reaches the
//! server-side scripts.

use std::time::Duration;

use crate::{MAX_NODE_ID_LEN, MAX_TTL_SECS, Result, RollcallError};

/// Validate a node id: non-empty, no surrounding or control whitespace, bounded length.
///
/// # Examples
///
/// ```
/// use rollcall_common::validate_node_id;
///
/// assert!(validate_node_id("worker-7").is_ok());
/// assert!(validate_node_id("").is_err());
/// assert!(validate_node_id(" worker-7").is_err());
/// ```
pub fn validate_node_id(node_id: &str) -> Result<()> {
    if node_id.is_empty() {
        return Err(RollcallError::InvalidArgument(
            "node id cannot be empty".to_string(),
        ));
    }
    if node_id.trim() != node_id {
        return Err(RollcallError::InvalidArgument(format!(
            "node id '{}' has leading or trailing whitespace",
            node_id
        )));
    }
    if node_id.chars().any(char::is_control) {
        return Err(RollcallError::InvalidArgument(
            "node id cannot contain control characters".to_string(),
        ));
    }
    if node_id.len() > MAX_NODE_ID_LEN {
        return Err(RollcallError::InvalidArgument(format!(
            "node id is {} bytes, limit is {}",
            node_id.len(),
            MAX_NODE_ID_LEN
        )));
    }
    Ok(())
}

/// Convert a lease duration to whole seconds, rounding partial seconds up.
///
/// A zero duration is rejected: a lease must outlive the call that grants it.
/// Anything longer than [`MAX_TTL_SECS`] is rejected too, so lease expiry
/// always fits both the store clocks and the scripts' millisecond scores.
pub fn ttl_to_secs(ttl: Duration) -> Result<u64> {
    if ttl.is_zero() {
        return Err(RollcallError::InvalidArgument(
            "ttl must be positive".to_string(),
        ));
    }
    match ttl.as_secs().checked_add(u64::from(ttl.subsec_nanos() > 0)) {
        Some(secs) if secs <= MAX_TTL_SECS => Ok(secs),
        _ => Err(RollcallError::InvalidArgument(format!(
            "ttl must not exceed {} seconds",
            MAX_TTL_SECS
        ))),
    }
}

/// Reject zero periods for ticker-driven tasks.
pub fn validate_interval(name: &str, interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(RollcallError::InvalidArgument(format!(
            "{} must be positive",
            name
        )));
    }
    Ok(())
}
