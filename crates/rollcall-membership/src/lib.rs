//! Rollcall Membership - lease-based membership with dense ordinals
//!
//! A worker registers under a unique node id and receives the smallest free
//! ordinal. It keeps its lease alive with a heartbeat task, reads
//! `(ordinal, total)` to pick its share of partitioned work, and deregisters on
//! shutdown. Monitor tasks, on any number of workers, evict nodes whose leases
//! lapsed so their ordinals can be reused.
//!
//! All cross-process coordination happens inside the store's atomic
//! operations; this crate never composes read-then-write sequences and takes
//! no client-side locks.

pub mod decode;
pub mod heartbeat;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod shutdown;
pub mod task;

pub use decode::ScriptReply;
pub use heartbeat::{HeartbeatHandle, HeartbeatState, HeartbeatStatus};
pub use manager::{MembershipConfig, MembershipManager};
pub use model::NodeInfo;
pub use monitor::{MonitorHandle, MonitorState, MonitorStatus};
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use task::TaskHandle;

pub use rollcall_common::{Result, RollcallError};
