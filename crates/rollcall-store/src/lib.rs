//! Rollcall Store - Atomic store adapters
//!
//! This crate provides:
//! - The `AtomicStore` trait: one atomic round trip per membership operation
//! - `Reply`: the untyped reply model every adapter returns
//! - `RedisStore`: Lua scripts evaluated server-side against Redis
//! - `MemoryStore`: the same protocol inside a single process
//! - `StoreBuilder`: backend selection from configuration

pub mod builder;
pub mod memory;
pub mod redis;
pub mod reply;
pub mod store;

pub use builder::StoreBuilder;
pub use memory::MemoryStore;
pub use self::redis::{KeySpace, RedisStore, RedisStoreConfig};
pub use reply::Reply;
pub use store::{AtomicStore, StoreOp};

/// Backend name for [`RedisStore`]
pub const BACKEND_REDIS: &str = "redis";

/// Backend name for [`MemoryStore`]
pub const BACKEND_MEMORY: &str = "memory";
