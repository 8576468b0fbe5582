//! Key-value backends holding serialized session payloads.
//!
//! The store sees one logical endpoint with `GET`/`SET`/`DEL`/`TTL`
//! semantics. Whether that endpoint is a single Redis instance, a master
//! resolved through Sentinel, or an in-memory map is invisible to the store
//! and does not change its error contract: failures surface from every
//! operation and are never retried here.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands as _;
use redis::aio::ConnectionManager;
use redis::sentinel::{SentinelClient, SentinelServerType};

use crate::error::{Error, Result};

/// A key-value endpoint with per-key TTLs.
///
/// `set` with `ttl_seconds == 0` writes the entry without an expiry.
/// `delete` of a missing key succeeds. `ttl` follows Redis semantics:
/// `None` for a missing key, `Some(-1)` for an entry with no expiry,
/// otherwise the remaining seconds.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn ttl(&self, key: &str) -> Result<Option<i64>>;
}

/// A single Redis instance, multiplexed through a [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connects to a single Redis endpoint, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        if ttl_seconds == 0 {
            let _: () = conn.set(key, value).await?;
        } else {
            let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.manager.clone();
        let remaining: i64 = conn.ttl(key).await?;
        Ok(if remaining == -2 { None } else { Some(remaining) })
    }
}

/// A Redis master resolved through a Sentinel quorum.
///
/// Each operation asks the Sentinel client for a connection to the current
/// master, so a completed failover is picked up on the next call. An
/// operation that races a failover fails like any other backend error;
/// nothing is retried.
pub struct SentinelBackend {
    client: tokio::sync::Mutex<SentinelClient>,
}

impl SentinelBackend {
    /// Connects through the given Sentinel addresses
    /// (e.g. `redis://10.0.0.1:26379`), resolving the master registered
    /// under `master_name`.
    pub fn connect(sentinel_urls: Vec<String>, master_name: &str) -> Result<Self> {
        let client = SentinelClient::build(
            sentinel_urls,
            master_name.to_string(),
            None,
            SentinelServerType::Master,
        )?;
        Ok(Self {
            client: tokio::sync::Mutex::new(client),
        })
    }

    async fn master(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut client = self.client.lock().await;
        Ok(client.get_async_connection().await?)
    }
}

#[async_trait]
impl SessionBackend for SentinelBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.master().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut conn = self.master().await?;
        if ttl_seconds == 0 {
            let _: () = conn.set(key, value).await?;
        } else {
            let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.master().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.master().await?;
        let remaining: i64 = conn.ttl(key).await?;
        Ok(if remaining == -2 { None } else { Some(remaining) })
    }
}

struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| deadline <= Instant::now())
    }
}

/// An in-memory backend for tests and local development.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Backend("memory backend lock is poisoned".into()))?;

        if entries.get(key).is_some_and(MemoryEntry::is_expired) {
            entries.remove(key);
        }

        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let expires_at = (ttl_seconds > 0).then(|| Instant::now() + Duration::from_secs(ttl_seconds));
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Backend("memory backend lock is poisoned".into()))?;

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Backend("memory backend lock is poisoned".into()))?;

        entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Backend("memory backend lock is poisoned".into()))?;

        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            return Ok(None);
        }

        Ok(Some(match entry.expires_at {
            None => -1,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                remaining.as_secs_f64().round() as i64
            }
        }))
    }
}
