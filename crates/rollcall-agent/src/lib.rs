//! Rollcall Agent - hosts one membership node
//!
//! Loads configuration, installs logging and the optional metrics exporter,
//! then keeps the node registered until Ctrl+C or SIGTERM.

pub mod agent;
pub mod config;
pub mod logging;
pub mod signal;

pub use agent::{Agent, install_metrics_exporter};
pub use self::config::{AgentConfig, Cli};
pub use logging::{LoggingConfig, LoggingGuard, init_logging};
