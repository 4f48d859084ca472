//! Persistence collaborator — a plain string key/value interface.
//!
//! The orchestration core reads and writes through `KvStore` and never
//! touches a storage medium directly. Backends: `MemoryStore` (default,
//! tests) and `RedisStore` (production, selected when `REDIS_URL` is set).

use anyhow::Result;
use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}
