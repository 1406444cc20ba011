//! Persistent key-value storage: the API key and the translation cache.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::StoreError;
use crate::language::Direction;

pub const API_KEY: &str = "apiKey";
pub const TRANSLATION_CACHE: &str = "translationCache";
pub const CACHE_CAPACITY: usize = 100;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Non-persistent store, used for tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: &str) -> Self {
        let store = Self::default();
        store
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(API_KEY.to_string(), Value::String(key.to_string()));
        store
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON object on disk; every key is a top-level field.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        doc.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&doc)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// The stored API key, if set and non-blank.
pub async fn api_key(store: &dyn KeyValueStore) -> Result<Option<String>, StoreError> {
    Ok(store
        .get(API_KEY)
        .await?
        .and_then(|v| v.as_str().map(str::trim).map(str::to_string))
        .filter(|k| !k.is_empty()))
}

pub async fn set_api_key(store: &dyn KeyValueStore, key: &str) -> Result<(), StoreError> {
    store.set(API_KEY, Value::String(key.trim().to_string())).await
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub translation: String,
    /// Epoch milliseconds at insertion.
    pub timestamp: i64,
}

/// Bounded `"<direction>:<text>"` → translation map kept in the store.
/// When full, the oldest insertion is evicted.
#[derive(Clone)]
pub struct TranslationCache {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
    /// Writes are read-modify-write over the whole map; clones share it.
    writes: Arc<tokio::sync::Mutex<()>>,
}

impl TranslationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, CACHE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            writes: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn key(direction: Direction, text: &str) -> String {
        format!("{direction}:{text}")
    }

    async fn entries(&self) -> Result<HashMap<String, CacheEntry>, StoreError> {
        let Some(raw) = self.store.get(TRANSLATION_CACHE).await? else {
            return Ok(HashMap::new());
        };
        match serde_json::from_value(raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(error = %e, "discarding unreadable translation cache");
                Ok(HashMap::new())
            }
        }
    }

    pub async fn get(&self, direction: Direction, text: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries().await?;
        Ok(entries
            .remove(&Self::key(direction, text))
            .map(|e| e.translation))
    }

    pub async fn put(
        &self,
        direction: Direction,
        text: &str,
        translation: &str,
    ) -> Result<(), StoreError> {
        let _writing = self.writes.lock().await;
        let mut entries = self.entries().await?;
        // Strictly increasing, so insertion order survives bursts within one millisecond.
        let newest = entries.values().map(|e| e.timestamp).max().unwrap_or(i64::MIN);
        let timestamp = chrono::Utc::now().timestamp_millis().max(newest.saturating_add(1));
        entries.insert(
            Self::key(direction, text),
            CacheEntry {
                translation: translation.to_string(),
                timestamp,
            },
        );

        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.timestamp)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => entries.remove(&key),
                None => break,
            };
        }

        self.store
            .set(TRANSLATION_CACHE, serde_json::to_value(&entries)?)
            .await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries().await?.len())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let _writing = self.writes.lock().await;
        self.store
            .set(TRANSLATION_CACHE, Value::Object(Map::new()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_api_key_counts_as_missing() {
        let store = MemoryStore::with_api_key("   ");
        assert_eq!(api_key(&store).await.unwrap(), None);
        set_api_key(&store, " sk-123 ").await.unwrap();
        assert_eq!(api_key(&store).await.unwrap().as_deref(), Some("sk-123"));
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(API_KEY).await.unwrap(), None);
        set_api_key(&store, "sk-abc").await.unwrap();
        store.set("other", Value::from(3)).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(api_key(&reopened).await.unwrap().as_deref(), Some("sk-abc"));
        assert_eq!(reopened.get("other").await.unwrap(), Some(Value::from(3)));
    }

    #[tokio::test]
    async fn cache_keys_include_direction() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = TranslationCache::new(store);
        cache.put(Direction::LatinToCjk, "hello", "你好").await.unwrap();
        assert_eq!(
            cache.get(Direction::LatinToCjk, "hello").await.unwrap().as_deref(),
            Some("你好")
        );
        assert_eq!(cache.get(Direction::CjkToLatin, "hello").await.unwrap(), None);
        assert_eq!(TranslationCache::key(Direction::CjkToLatin, "你好"), "zh-to-en:你好");
    }

    #[tokio::test]
    async fn cache_evicts_oldest_insertion_past_capacity() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = TranslationCache::new(store);
        for i in 0..=CACHE_CAPACITY {
            cache
                .put(Direction::LatinToCjk, &format!("word{i}"), "x")
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await.unwrap(), CACHE_CAPACITY);
        assert_eq!(cache.get(Direction::LatinToCjk, "word0").await.unwrap(), None);
        assert!(cache.get(Direction::LatinToCjk, "word1").await.unwrap().is_some());
        assert!(cache
            .get(Direction::LatinToCjk, &format!("word{CACHE_CAPACITY}"))
            .await
            .unwrap()
            .is_some());
    }

    /// Suspends on every read so concurrent writers interleave.
    #[derive(Default)]
    struct SlowReads(MemoryStore);

    #[async_trait]
    impl KeyValueStore for SlowReads {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            tokio::task::yield_now().await;
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
            self.0.set(key, value).await
        }
    }

    #[tokio::test]
    async fn concurrent_puts_keep_both_entries() {
        let store: Arc<dyn KeyValueStore> = Arc::new(SlowReads::default());
        let cache = TranslationCache::new(store);
        let other = cache.clone();

        let (a, b) = tokio::join!(
            cache.put(Direction::LatinToCjk, "hello", "你好"),
            other.put(Direction::CjkToLatin, "世界", "world"),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(cache.len().await.unwrap(), 2);
        assert!(cache.get(Direction::LatinToCjk, "hello").await.unwrap().is_some());
        assert!(cache.get(Direction::CjkToLatin, "世界").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_cache_is_treated_as_empty() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(TRANSLATION_CACHE, Value::from("nonsense")).await.unwrap();
        let cache = TranslationCache::new(store);
        assert_eq!(cache.get(Direction::LatinToCjk, "a").await.unwrap(), None);
        cache.put(Direction::LatinToCjk, "a", "b").await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 1);
    }
}
