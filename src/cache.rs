//! Response cache for chat answers.
//!
//! A plain time-expiring key-value store behind [`ResponseCache`]:
//! [`RedisCache`] for deployments, [`MemoryCache`] for tests and
//! single-process use. Values are JSON strings; [`get_json`] treats a
//! payload that no longer deserializes as a miss.

use crate::config::CacheConfig;
use crate::error::PdfChatError;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default entry lifetime: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// A string key-value store whose entries expire.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PdfChatError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PdfChatError>;
}

/// Build the cache key of a chat request.
///
/// `{pdf_name}:{question}:{text_summary}:{llm_choice}`, with a missing
/// choice written as `none`.
pub fn cache_key(pdf_name: &str, question: &str, text_summary: bool, llm_choice: Option<&str>) -> String {
    format!(
        "{pdf_name}:{question}:{text_summary}:{}",
        llm_choice.unwrap_or("none")
    )
}

/// Read and deserialize a cached value. Malformed payloads are misses.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn ResponseCache,
    key: &str,
) -> Result<Option<T>, PdfChatError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring malformed cache entry '{}': {}", key, e);
            Ok(None)
        }
    }
}

/// Serialize and store a value.
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn ResponseCache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), PdfChatError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| PdfChatError::Internal(format!("cache serialization: {e}")))?;
    cache.set(key, &raw, ttl).await
}

/// Connect the cache described by `config`.
pub async fn from_config(config: &CacheConfig) -> Result<Arc<dyn ResponseCache>, PdfChatError> {
    match &config.redis_url {
        Some(url) => Ok(Arc::new(RedisCache::connect(url).await?)),
        None => {
            info!("Response cache: in-memory");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

// ── Redis ────────────────────────────────────────────────────────────────

/// Redis-backed cache using `SET key value EX ttl`.
///
/// `ConnectionManager` reconnects on its own and is cheap to clone, so each
/// call works on its own handle.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, PdfChatError> {
        let client = Client::open(url)
            .map_err(|e| PdfChatError::Cache(format!("Failed to create Redis client: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| PdfChatError::Cache(format!("Failed to connect to Redis: {e}")))?;
        info!("Response cache: redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PdfChatError> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| PdfChatError::Cache(format!("GET '{key}': {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PdfChatError> {
        let mut conn = self.connection.clone();
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs)
            .await
            .map_err(|e| PdfChatError::Cache(format!("SET '{key}': {e}")))?;
        debug!("Cached '{}' for {}s", key, secs);
        Ok(())
    }
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Process-local cache. Expired entries are dropped when read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, PdfChatError> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.0.clone(), entry.1 > now));
        match hit {
            Some((value, true)) => Ok(Some(value)),
            Some((_, false)) => {
                self.entries.remove_if(key, |_, (_, expires)| *expires <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), PdfChatError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}
