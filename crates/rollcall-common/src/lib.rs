//! Rollcall Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used by every rollcall component:
//! - The `RollcallError` taxonomy and `Result` alias
//! - Argument validation shared by the store adapters and the membership API
//! - Protocol-wide defaults

pub mod error;
pub mod utils;

pub use error::{Result, RollcallError};
pub use utils::{ttl_to_secs, validate_interval, validate_node_id};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default lease time-to-live in seconds
pub const DEFAULT_TTL_SECS: u64 = 30;

/// Longest lease accepted, in seconds (one year)
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Default upper bound for a single store round trip, in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Longest node id accepted by the registry
pub const MAX_NODE_ID_LEN: usize = 256;
