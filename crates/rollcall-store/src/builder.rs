//! Store backend selection from configuration

use std::sync::Arc;
use std::time::Duration;

use rollcall_common::{DEFAULT_NAMESPACE, Result, RollcallError};

use crate::memory::MemoryStore;
use crate::redis::{RedisStore, RedisStoreConfig};
use crate::store::AtomicStore;
use crate::{BACKEND_MEMORY, BACKEND_REDIS};

/// Builds the configured store backend
#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    backend: Option<String>,
    namespace: Option<String>,
    redis_url: Option<String>,
    connect_timeout: Option<Duration>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(RollcallError::Config(
                "store backend cannot be empty".to_string(),
            ));
        }

        Ok(backend)
    }

    fn resolve_namespace(&self) -> Result<String> {
        let namespace = self
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
            .trim()
            .to_string();
        if namespace.is_empty() {
            return Err(RollcallError::Config(
                "registry namespace cannot be empty".to_string(),
            ));
        }

        Ok(namespace)
    }

    /// Open the store. For Redis this connects and pings before returning.
    pub async fn build(&self) -> Result<Arc<dyn AtomicStore>> {
        let backend = self.resolve_backend()?;

        match backend.as_str() {
            BACKEND_REDIS => {
                let namespace = self.resolve_namespace()?;
                let url = self.redis_url.as_deref().unwrap_or_default().trim();
                if url.is_empty() {
                    return Err(RollcallError::Config(
                        "redis url is required for redis backend".to_string(),
                    ));
                }

                let mut config = RedisStoreConfig::new(url, namespace);
                if let Some(timeout) = self.connect_timeout {
                    config = config.with_connect_timeout(timeout);
                }

                let store = RedisStore::connect(config).await?;
                Ok(Arc::new(store))
            }
            BACKEND_MEMORY => Ok(Arc::new(MemoryStore::new())),
            other => Err(RollcallError::Config(format!(
                "unsupported store backend: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_memory_backend() {
        let store = StoreBuilder::new().backend(" Memory ").build().await.unwrap();
        assert_eq!(store.backend(), BACKEND_MEMORY);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_build_rejects_missing_backend() {
        let err = StoreBuilder::new().build().await.err().unwrap();
        assert_eq!(
            err,
            RollcallError::Config("store backend cannot be empty".to_string())
        );
    }

    #[tokio::test]
    async fn test_build_rejects_unknown_backend() {
        let err = StoreBuilder::new().backend("etcd").build().await.err().unwrap();
        assert_eq!(
            err,
            RollcallError::Config("unsupported store backend: etcd".to_string())
        );
    }

    #[tokio::test]
    async fn test_build_redis_requires_url() {
        let err = StoreBuilder::new()
            .backend("redis")
            .namespace("workers")
            .build()
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            RollcallError::Config("redis url is required for redis backend".to_string())
        );
    }
}
