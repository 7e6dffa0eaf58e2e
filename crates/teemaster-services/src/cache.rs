//! Shared key-value cache used for federation.
//!
//! Each master instance writes only its own key and reads its peers' keys,
//! so no coordination is needed between writers. Values carry no TTL: a
//! key holds whatever its owner last published.
//!
//! Two backends:
//!   - `Redis`: the production backend, shared between instances.
//!   - `Memory`: an in-process map for single-instance runs and tests.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::CacheError;

#[derive(Clone)]
pub enum SharedCache {
    Memory(MemoryCache),
    Redis(RedisCache),
}

impl SharedCache {
    /// Connect to the cache at `url`. An empty URL selects the in-process
    /// backend.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        if url.is_empty() {
            return Ok(SharedCache::Memory(MemoryCache::new()));
        }
        Ok(SharedCache::Redis(RedisCache::connect(url).await?))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        match self {
            SharedCache::Memory(cache) => Ok(cache.get(key)),
            SharedCache::Redis(cache) => cache.get(key).await,
        }
    }

    /// Overwrite the value under `key`.
    pub async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        match self {
            SharedCache::Memory(cache) => {
                cache.set(key, value);
                Ok(())
            }
            SharedCache::Redis(cache) => cache.set(key, value).await,
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            SharedCache::Memory(_) => "memory",
            SharedCache::Redis(_) => "redis",
        }
    }
}

// ── In-process ───────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryCache {
    values: Arc<DashMap<String, Bytes>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.values.get(key).map(|v| v.value().clone())
    }

    pub fn set(&self, key: &str, value: Bytes) {
        self.values.insert(key.to_string(), value);
    }
}

// ── Redis ────────────────────────────────────────────────────────────────────

/// Redis-backed cache. The connection manager reconnects on its own after
/// a dropped connection; a failed call surfaces as `CacheError::Redis`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(url, "connected to shared cache");
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    pub async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value.to_vec()).await?;
        Ok(())
    }
}
