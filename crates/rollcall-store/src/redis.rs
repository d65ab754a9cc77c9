//! Redis-backed store
//!
//! Each membership operation is a Lua script evaluated with `EVALSHA`; the
//! `redis` crate reloads a script transparently when the server answers
//! `NOSCRIPT`. Scripts read time from `TIME`, so every lease is measured on the
//! server clock and callers' clock skew never matters. Requires Redis 5 or
//! newer (effects replication of scripts that call `TIME` before writing).
//!
//! Layout, per namespace:
//! - `rollcall:{<ns>}:ordinals` HASH node id -> ordinal
//! - `rollcall:{<ns>}:leases` ZSET node id -> lease expiry (epoch ms)

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, Script, Value};
use tracing::{debug, info};

use rollcall_common::{DEFAULT_NAMESPACE, Result, RollcallError};

use crate::BACKEND_REDIS;
use crate::reply::Reply;
use crate::store::{AtomicStore, StoreOp};

const REGISTER_OR_REFRESH_SCRIPT: &str = include_str!("scripts/register_or_refresh.lua");
const DEREGISTER_SCRIPT: &str = include_str!("scripts/deregister.lua");
const GET_NODE_INFO_SCRIPT: &str = include_str!("scripts/get_node_info.lua");
const MONITOR_SCRIPT: &str = include_str!("scripts/monitor.lua");

/// Redis store configuration
#[derive(Clone, Debug)]
pub struct RedisStoreConfig {
    /// Connection URL, `redis://[:password@]host:port[/db]`
    pub url: String,
    /// Registry namespace; nodes in different namespaces never see each other
    pub namespace: String,
    /// Upper bound for establishing the connection
    pub connect_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a connection URL from its parts.
    ///
    /// The password is inserted verbatim; reserved URL characters must already
    /// be percent-encoded.
    pub fn url_from_parts(address: &str, port: u16, db: i64, password: Option<&str>) -> String {
        match password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{}@{}:{}/{}", password, address, port, db)
            }
            _ => format!("redis://{}:{}/{}", address, port, db),
        }
    }
}

/// Key names for one registry namespace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpace {
    ordinals: String,
    leases: String,
}

impl KeySpace {
    pub fn new(namespace: &str) -> Self {
        // The hash tag keeps both keys in one cluster slot, which multi-key scripts require
        let prefix = format!("rollcall:{{{}}}", namespace);
        Self {
            ordinals: format!("{}:ordinals", prefix),
            leases: format!("{}:leases", prefix),
        }
    }

    pub fn ordinals(&self) -> &str {
        &self.ordinals
    }

    pub fn leases(&self) -> &str {
        &self.leases
    }
}

struct Scripts {
    register_or_refresh: Script,
    deregister: Script,
    get_node_info: Script,
    monitor: Script,
}

impl Scripts {
    fn load() -> Self {
        Self {
            register_or_refresh: Script::new(REGISTER_OR_REFRESH_SCRIPT),
            deregister: Script::new(DEREGISTER_SCRIPT),
            get_node_info: Script::new(GET_NODE_INFO_SCRIPT),
            monitor: Script::new(MONITOR_SCRIPT),
        }
    }
}

/// Redis registry client
pub struct RedisStore {
    conn: RwLock<Option<MultiplexedConnection>>,
    keys: KeySpace,
    scripts: Scripts,
}

impl RedisStore {
    /// Open the connection and verify it with a PING
    pub async fn connect(config: RedisStoreConfig) -> Result<Self> {
        let namespace = config.namespace.trim();
        if namespace.is_empty() {
            return Err(RollcallError::Config(
                "registry namespace cannot be empty".to_string(),
            ));
        }

        let client = Client::open(config.url.as_str())
            .map_err(|e| RollcallError::Config(format!("invalid redis url: {}", e)))?;

        let mut conn = tokio::time::timeout(
            config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            RollcallError::Transport(format!(
                "connecting to redis timed out after {:?}",
                config.connect_timeout
            ))
        })?
        .map_err(|e| RollcallError::Transport(format!("failed to connect to redis: {}", e)))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("ping", e))?;

        info!(namespace, "Connected to redis registry");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            keys: KeySpace::new(namespace),
            scripts: Scripts::load(),
        })
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    fn connection(&self) -> Result<MultiplexedConnection> {
        self.conn
            .read()
            .clone()
            .ok_or_else(|| RollcallError::Transport("redis connection is closed".to_string()))
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn execute(&self, op: StoreOp<'_>) -> Result<Reply> {
        op.check_ttl()?;
        let mut conn = self.connection()?;

        let mut invocation = match op {
            StoreOp::RegisterOrRefresh { .. } => self.scripts.register_or_refresh.prepare_invoke(),
            StoreOp::Deregister { .. } => self.scripts.deregister.prepare_invoke(),
            StoreOp::GetNodeInfo { .. } => self.scripts.get_node_info.prepare_invoke(),
            StoreOp::Monitor => self.scripts.monitor.prepare_invoke(),
        };
        invocation.key(self.keys.ordinals()).key(self.keys.leases());
        if let Some(node_id) = op.node_id() {
            invocation.arg(node_id);
        }
        if let StoreOp::RegisterOrRefresh { ttl_secs, .. } = op {
            invocation.arg(ttl_secs);
        }

        let value: Value = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(op.name(), e))?;

        let reply = Reply::from(value);
        debug!(operation = op.name(), reply = %reply, "Executed redis script");
        Ok(reply)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("ping", e))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.conn.write().take().is_some() {
            info!("Closed redis registry connection");
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        BACKEND_REDIS
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Nil => Reply::Nil,
            Value::Int(value) => Reply::Integer(value),
            Value::BulkString(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Reply::Text(text),
                Err(e) => Reply::Other(format!(
                    "non-utf8 bulk string of {} bytes",
                    e.as_bytes().len()
                )),
            },
            Value::SimpleString(text) => Reply::Text(text),
            Value::Okay => Reply::Text("OK".to_string()),
            Value::Array(items) => Reply::Array(items.into_iter().map(Reply::from).collect()),
            other => Reply::Other(format!("{:?}", other)),
        }
    }
}

/// Connection-level failures are transport errors; anything the server
/// answered with (a failing script, a rejected command) is reported as-is.
fn map_redis_error(operation: &str, error: RedisError) -> RollcallError {
    if error.is_io_error()
        || error.is_timeout()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
    {
        RollcallError::Transport(format!("{} failed: {}", operation, error))
    } else {
        RollcallError::ScriptReported(format!("{} failed: {}", operation, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_space_is_hash_tagged() {
        let keys = KeySpace::new("lag-exporters");
        assert_eq!(keys.ordinals(), "rollcall:{lag-exporters}:ordinals");
        assert_eq!(keys.leases(), "rollcall:{lag-exporters}:leases");
    }

    #[test]
    fn test_url_from_parts() {
        assert_eq!(
            RedisStoreConfig::url_from_parts("localhost", 6379, 0, None),
            "redis://localhost:6379/0"
        );
        assert_eq!(
            RedisStoreConfig::url_from_parts("10.0.0.5", 6380, 2, Some("s3cret")),
            "redis://:s3cret@10.0.0.5:6380/2"
        );
        assert_eq!(
            RedisStoreConfig::url_from_parts("localhost", 6379, 0, Some("")),
            "redis://localhost:6379/0"
        );
    }

    #[test]
    fn test_value_conversion() {
        let value = Value::Array(vec![
            Value::BulkString(b"ok".to_vec()),
            Value::Int(2),
            Value::Int(5),
        ]);
        assert_eq!(
            Reply::from(value),
            Reply::Array(vec![Reply::text("ok"), Reply::Integer(2), Reply::Integer(5)])
        );

        assert_eq!(Reply::from(Value::Nil), Reply::Nil);
        assert_eq!(Reply::from(Value::Okay), Reply::text("OK"));
        assert_eq!(
            Reply::from(Value::SimpleString("PONG".to_string())),
            Reply::text("PONG")
        );
        assert!(matches!(
            Reply::from(Value::BulkString(vec![0xff, 0xfe])),
            Reply::Other(_)
        ));
        assert!(matches!(Reply::from(Value::Double(1.5)), Reply::Other(_)));
    }

    #[test]
    fn test_scripts_touch_only_declared_keys() {
        for script in [
            REGISTER_OR_REFRESH_SCRIPT,
            DEREGISTER_SCRIPT,
            GET_NODE_INFO_SCRIPT,
            MONITOR_SCRIPT,
        ] {
            assert!(!script.contains("rollcall:"), "scripts must address keys via KEYS[]");
        }
    }

    #[test]
    fn test_error_mapping() {
        let script_error = RedisError::from((
            redis::ErrorKind::ResponseError,
            "ERR user_script:12: Script attempted to access nonexistent global variable",
        ));
        let err = map_redis_error("register_or_refresh", script_error);
        assert!(matches!(err, RollcallError::ScriptReported(_)), "{}", err);
        assert!(err.to_string().contains("register_or_refresh failed"));

        let refused = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(map_redis_error("ping", refused).is_transport());

        let reset = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ));
        assert!(map_redis_error("monitor", reset).is_transport());

        let timed_out = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        ));
        assert!(map_redis_error("get_node_info", timed_out).is_transport());
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_namespace() {
        let config = RedisStoreConfig::new("redis://localhost:6379", "  ");
        let err = RedisStore::connect(config).await.err().unwrap();
        assert!(matches!(err, RollcallError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let config = RedisStoreConfig::new("not-a-url", "default");
        let err = RedisStore::connect(config).await.err().unwrap();
        assert!(matches!(err, RollcallError::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_is_transport_error() {
        // Port 1 on localhost is reserved and refuses connections
        let config = RedisStoreConfig::new("redis://127.0.0.1:1", "default")
            .with_connect_timeout(Duration::from_secs(2));
        let err = RedisStore::connect(config).await.err().unwrap();
        assert!(err.is_transport(), "unexpected error: {}", err);
    }
}
