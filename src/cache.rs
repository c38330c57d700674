use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::io;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use url::form_urlencoded;

use crate::model::ComponentRecord;

/// How long a captured component list stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

/// Optional persistent key-value backing store.
///
/// Every call may fail; the cache logs and ignores those failures.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn put(&self, key: &str, value: String) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Source of "now" in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A captured component list. Both tiers store this shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub data: Vec<Arc<ComponentRecord>>,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl CacheEntry {
    /// Valid while `now - timestamp < ttl`.
    pub fn is_fresh(&self, now_millis: i64, ttl: Duration) -> bool {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_millis.saturating_sub(self.timestamp) < ttl_millis
    }
}

pub fn cache_key(source_name: &str) -> String {
    format!("{}-components", source_name)
}

/// Two-tier TTL cache of component lists, keyed by source name.
#[derive(Clone)]
pub struct ComponentCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    /// Bumped by every invalidation of a source.
    generations: Arc<RwLock<HashMap<String, u64>>>,
    store: Option<Arc<dyn DurableStore>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ComponentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            generations: Arc::new(RwLock::new(HashMap::new())),
            store: None,
            clock: Arc::new(SystemClock),
            ttl,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh components for `source_name`, checking memory then the durable store.
    ///
    /// A fresh durable entry is copied into memory before it is returned.
    pub async fn get(&self, source_name: &str) -> Option<Vec<Arc<ComponentRecord>>> {
        let key = cache_key(source_name);
        let now = self.clock.now_millis();

        let cached = self.entries.read().await.get(&key).cloned();
        if let Some(entry) = cached {
            if entry.is_fresh(now, self.ttl) {
                tracing::debug!("Memory cache hit for {}", key);
                return Some(entry.data);
            }
        }

        let store = self.store.as_ref()?;
        let raw = match store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read {} from durable cache: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.is_fresh(now, self.ttl) => {
                tracing::debug!("Durable cache hit for {}", key);
                let data = entry.data.clone();
                self.entries.write().await.insert(key, entry);
                Some(data)
            }
            Ok(_) => {
                tracing::debug!("Durable cache entry for {} is stale", key);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to decode durable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Invalidation counter for `source_name`. Pass it to [`Self::put_if_current`]
    /// so data fetched before an invalidation is not stored after it.
    pub async fn generation(&self, source_name: &str) -> u64 {
        self.generations
            .read()
            .await
            .get(source_name)
            .copied()
            .unwrap_or_default()
    }

    /// Replaces the entry for `source_name` in both tiers.
    pub async fn put(&self, source_name: &str, data: Vec<Arc<ComponentRecord>>) {
        let _generations = self.generations.read().await;
        self.write(source_name, data).await;
    }

    /// Like [`Self::put`], but only while `source_name` has not been invalidated since
    /// `generation` was read. Returns whether the entry was stored.
    pub async fn put_if_current(
        &self,
        source_name: &str,
        data: Vec<Arc<ComponentRecord>>,
        generation: u64,
    ) -> bool {
        let generations = self.generations.read().await;
        if generations.get(source_name).copied().unwrap_or_default() != generation {
            tracing::info!("Discarding components for {} fetched before invalidation", source_name);
            return false;
        }
        self.write(source_name, data).await;
        true
    }

    async fn write(&self, source_name: &str, data: Vec<Arc<ComponentRecord>>) {
        let key = cache_key(source_name);
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
        };

        let serialized = self
            .store
            .as_ref()
            .map(|store| (store, serde_json::to_string(&entry)));
        self.entries.write().await.insert(key.clone(), entry);

        match serialized {
            Some((store, Ok(value))) => {
                if let Err(e) = store.put(&key, value).await {
                    tracing::warn!("Failed to write {} to durable cache: {}", key, e);
                }
            }
            Some((_, Err(e))) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", key, e);
            }
            None => {}
        }
    }

    /// Drops the entry for `source_name` from both tiers.
    pub async fn invalidate(&self, source_name: &str) {
        let mut generations = self.generations.write().await;
        *generations.entry(source_name.to_string()).or_default() += 1;

        let key = cache_key(source_name);
        self.entries.write().await.remove(&key);

        if let Some(store) = &self.store {
            if let Err(e) = store.delete(&key).await {
                tracing::warn!("Failed to clear {} from durable cache: {}", key, e);
            }
        }
        tracing::info!("Cache invalidated for {}", key);
    }

    pub async fn contains_fresh(&self, source_name: &str) -> bool {
        let now = self.clock.now_millis();
        self.entries
            .read()
            .await
            .get(&cache_key(source_name))
            .is_some_and(|entry| entry.is_fresh(now, self.ttl))
    }
}

impl Default for ComponentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Durable store keeping one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Percent-encodes the key so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
        self.cache_dir.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => {
                tracing::warn!("Cache file {:?} is empty, skipping.", path);
                Ok(None)
            }
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).await?;
        let path = self.path_for(key);
        fs::write(&path, value).await?;
        tracing::debug!("Saved cache entry '{}' to {:?}", key, path);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Durable store held in process memory; useful when no real backend exists.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.data.write().await.remove(key);
        Ok(())
    }
}
