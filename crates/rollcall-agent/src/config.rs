//! Agent configuration
//!
//! Sources, lowest precedence first: built-in defaults, the YAML file
//! (`conf/rollcall.yml` if present, or `--config`), `ROLLCALL_*` environment
//! variables with `__` between nested keys, then command line flags.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::{Deserialize, Serialize};
use tracing::Level;

use rollcall_common::{
    DEFAULT_NAMESPACE, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TTL_SECS, MAX_TTL_SECS, Result,
    RollcallError, validate_node_id,
};
use rollcall_store::{BACKEND_MEMORY, BACKEND_REDIS, RedisStoreConfig};

use crate::logging::LogRotation;

pub const DEFAULT_CONFIG_FILE: &str = "conf/rollcall.yml";
pub const ENV_PREFIX: &str = "ROLLCALL";

/// Command line arguments for the agent
#[derive(Debug, Default, Parser)]
#[command(name = "rollcall-agent", version, about)]
pub struct Cli {
    /// Configuration file, replaces conf/rollcall.yml
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Node id to register under
    #[arg(long = "node-id")]
    pub node_id: Option<String>,
    /// Store backend: redis or memory
    #[arg(long = "backend")]
    pub backend: Option<String>,
    #[arg(long = "redis-address")]
    pub redis_address: Option<String>,
    #[arg(long = "redis-port")]
    pub redis_port: Option<u16>,
    /// Run the eviction monitor in this process
    #[arg(long = "monitor", overrides_with = "no_monitor")]
    pub monitor: bool,
    #[arg(long = "no-monitor", overrides_with = "monitor")]
    pub no_monitor: bool,
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    fn monitor_override(&self) -> Option<bool> {
        if self.no_monitor {
            Some(false)
        } else if self.monitor {
            Some(true)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Empty means `<hostname>-<random suffix>`
    pub id: String,
    pub ttl_secs: u64,
    pub heartbeat_interval_ms: u64,
    pub report_interval_ms: u64,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: String::new(),
            ttl_secs: DEFAULT_TTL_SECS,
            heartbeat_interval_ms: 10_000,
            report_interval_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 15_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    pub address: String,
    pub port: u16,
    pub db: i64,
    /// Inserted into the connection URL as-is, so it must be percent-encoded
    pub password: Option<String>,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: 5000,
        }
    }
}

impl RedisSection {
    pub fn url(&self) -> String {
        RedisStoreConfig::url_from_parts(
            &self.address,
            self.port,
            self.db,
            self.password.as_deref(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: String,
    pub namespace: String,
    pub redis: RedisSection,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: BACKEND_REDIS.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            redis: RedisSection::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub console: bool,
    pub file: bool,
    /// Directory for rolling log files, defaults to `~/rollcall/logs`
    pub dir: Option<String>,
    /// `daily`, `hourly` or `never`
    pub rotation: LogRotation,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: false,
            dir: None,
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    /// `host:port` for the Prometheus scrape endpoint; unset disables it
    pub listen: Option<String>,
}

/// Fully resolved agent configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub node: NodeSection,
    pub monitor: MonitorSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
}

impl AgentConfig {
    /// Load from every source, fill in the node id and validate
    pub fn load(cli: &Cli) -> Result<Self> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::load_with_env(cli, env)
    }

    fn load_with_env(cli: &Cli, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(env);
        builder = apply_cli_overrides(builder, cli).map_err(config_error)?;

        let mut config: AgentConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        if config.node.id.trim().is_empty() {
            config.node.id = default_node_id();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_node_id(&self.node.id)
            .map_err(|e| RollcallError::Config(format!("node.id: {}", e)))?;

        if !(1..=MAX_TTL_SECS).contains(&self.node.ttl_secs) {
            return Err(RollcallError::Config(format!(
                "node.ttl_secs must be between 1 and {}",
                MAX_TTL_SECS
            )));
        }
        if self.node.heartbeat_interval_ms == 0 {
            return Err(invalid("node.heartbeat_interval_ms must be positive"));
        }
        if self.node.heartbeat_interval_ms >= self.node.ttl_secs.saturating_mul(1000) {
            return Err(invalid(
                "node.heartbeat_interval_ms must be shorter than node.ttl_secs",
            ));
        }
        if self.node.report_interval_ms == 0 {
            return Err(invalid("node.report_interval_ms must be positive"));
        }
        if self.monitor.interval_ms == 0 {
            return Err(invalid("monitor.interval_ms must be positive"));
        }

        match self.storage.backend.trim().to_ascii_lowercase().as_str() {
            BACKEND_REDIS | BACKEND_MEMORY => {}
            other => {
                return Err(RollcallError::Config(format!(
                    "unsupported store backend: {}",
                    other
                )));
            }
        }
        if self.storage.namespace.trim().is_empty() {
            return Err(invalid("storage.namespace cannot be empty"));
        }
        if self.storage.redis.request_timeout_ms == 0 || self.storage.redis.connect_timeout_ms == 0
        {
            return Err(invalid("storage.redis timeouts must be positive"));
        }

        self.log_level()?;
        self.metrics_listen()?;
        Ok(())
    }

    pub fn node_id(&self) -> &str {
        &self.node.id
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.node.ttl_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.node.heartbeat_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.node.report_interval_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.redis.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.redis.connect_timeout_ms)
    }

    pub fn log_level(&self) -> Result<Level> {
        self.logging.level.parse().map_err(|_| {
            RollcallError::Config(format!("invalid logging.level: {}", self.logging.level))
        })
    }

    pub fn metrics_listen(&self) -> Result<Option<SocketAddr>> {
        self.metrics
            .listen
            .as_deref()
            .map(|listen| {
                listen.parse().map_err(|_| {
                    RollcallError::Config(format!("invalid metrics.listen address: {}", listen))
                })
            })
            .transpose()
    }
}

fn apply_cli_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    cli: &Cli,
) -> std::result::Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    if let Some(v) = &cli.node_id {
        builder = builder.set_override("node.id", v.as_str())?;
    }
    if let Some(v) = &cli.backend {
        builder = builder.set_override("storage.backend", v.as_str())?;
    }
    if let Some(v) = &cli.redis_address {
        builder = builder.set_override("storage.redis.address", v.as_str())?;
    }
    if let Some(v) = cli.redis_port {
        builder = builder.set_override("storage.redis.port", i64::from(v))?;
    }
    if let Some(v) = cli.monitor_override() {
        builder = builder.set_override("monitor.enabled", v)?;
    }
    if let Some(v) = &cli.log_level {
        builder = builder.set_override("logging.level", v.as_str())?;
    }
    Ok(builder)
}

/// `<hostname>-<8 hex chars>`, unique per process start
pub fn default_node_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "node".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..8])
}

fn config_error(e: config::ConfigError) -> RollcallError {
    RollcallError::Config(e.to_string())
}

fn invalid(message: &str) -> RollcallError {
    RollcallError::Config(message.to_string())
}
