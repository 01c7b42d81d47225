//! Time-keyed cache partitioned by bucket
//!
//! One `TimedCache` is shared by every controller; each controller reads and
//! writes through a `CacheBucket` bound to its environment's name at
//! construction, so two environments can never see each other's entries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;

/// Cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Visible only while `now < inserted_at + ttl`
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.inserted_at + self.ttl
    }
}

type Buckets<V> = HashMap<String, HashMap<String, CacheEntry<V>>>;

/// In-memory cache with per-entry expiry
pub struct TimedCache<V> {
    buckets: RwLock<Buckets<V>>,
    default_ttl: Duration,
    capacity: usize,
}

impl<V: Clone> TimedCache<V> {
    /// Create a new cache holding at most `capacity` entries per bucket
    pub fn new(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            default_ttl,
            capacity,
        }
    }

    /// TTL applied by `CacheBucket::set`
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Bind a handle to one bucket
    pub fn bucket(self: &Arc<Self>, name: impl Into<String>) -> CacheBucket<V> {
        CacheBucket {
            cache: self.clone(),
            name: name.into(),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Option<V> {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        buckets
            .get(bucket)
            .and_then(|entries| entries.get(key))
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    fn insert(&self, bucket: &str, key: String, value: V, ttl: Duration) {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let entries = buckets.entry(bucket.to_string()).or_default();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let now = Instant::now();
            entries.retain(|_, e| e.is_fresh(now));

            // Still full: evict the oldest
            if entries.len() >= self.capacity {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    fn remove(&self, bucket: &str, key: &str) -> Option<V> {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets
            .get_mut(bucket)
            .and_then(|entries| entries.remove(key))
            .map(|entry| entry.value)
    }

    fn bucket_len(&self, bucket: &str) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        buckets
            .get(bucket)
            .map(|entries| entries.values().filter(|e| e.is_fresh(now)).count())
            .unwrap_or(0)
    }

    /// Drop expired entries from every bucket, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let mut removed = 0;
        for entries in buckets.values_mut() {
            let before = entries.len();
            entries.retain(|_, e| e.is_fresh(now));
            removed += before - entries.len();
        }
        buckets.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Clear every bucket
    pub fn clear(&self) {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets.clear();
    }

    /// Number of live entries across all buckets
    pub fn len(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        buckets
            .values()
            .flat_map(|entries| entries.values())
            .filter(|e| e.is_fresh(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to one bucket of a shared `TimedCache`
pub struct CacheBucket<V> {
    cache: Arc<TimedCache<V>>,
    name: String,
}

impl<V> Clone for CacheBucket<V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            name: self.name.clone(),
        }
    }
}

impl<V: Clone> CacheBucket<V> {
    /// Bucket name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a value; absent if never set or expired
    pub fn get(&self, key: &str) -> Option<V> {
        self.cache.get(&self.name, key)
    }

    /// Store a value with the cache's default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.cache
            .insert(&self.name, key.into(), value, self.cache.default_ttl);
    }

    /// Store a value with its own TTL
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.cache.insert(&self.name, key.into(), value, ttl);
    }

    /// Invalidate a key
    pub fn remove(&self, key: &str) -> Option<V> {
        self.cache.remove(&self.name, key)
    }

    /// Number of live entries in this bucket
    pub fn len(&self) -> usize {
        self.cache.bucket_len(&self.name)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
