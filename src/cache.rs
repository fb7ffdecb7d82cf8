use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredEntry<T> {
    value: T,
    expires_at: Instant,
}

/// In-process key/value cache where every entry carries its own expiry.
///
/// Clones share the same underlying map. Concurrent writers to one key
/// resolve as last-writer-wins.
#[derive(Debug)]
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, StoredEntry<T>>>>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            ttl: self.ttl,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Clone + Debug + Send + Sync> TtlCache<T> {
    #[must_use]
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stores a value with the cache's time-to-live.
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value), fields(cache = self.name))]
    pub async fn put(&self, key: &str, value: T) {
        let entry = StoredEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self), fields(cache = self.name))]
    pub async fn get(&self, key: &str) -> Option<T> {
        let entry = self.entries.read().await.get(key).cloned();

        match entry {
            Some(entry) if Instant::now() < entry.expires_at => {
                tracing::debug!("Key found and still fresh");
                Some(entry.value)
            }
            Some(_) => {
                tracing::debug!("Key found but expired");
                self.remove_expired(key).await;
                None
            }
            None => {
                tracing::debug!("Key not found");
                None
            }
        }
    }

    // Another writer may have refreshed the key between our read and this write.
    async fn remove_expired(&self, key: &str) {
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
        {
            entries.remove(key);
        }
    }
}
