//! Generic in-process cache with TTL and tag-based invalidation.
//!
//! Keys and tags are opaque strings; the cache has no knowledge of what's
//! being stored. Payloads are `serde_json::Value` and domains serialize
//! their own types.
//!
//! # Usage
//!
//! Writers:
//!   cache.put("role-perms:abc", json!(["leads.view"]), ttl, &["rbac"]).await;
//!
//! Readers:
//!   let perms = cache.get("role-perms:abc").await;
//!
//! Invalidation (e.g. after a role's permission sync):
//!   cache.invalidate_tag("rbac").await;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
    tags: Vec<String>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tag_index: HashMap<String, HashSet<String>>,
}

impl CacheInner {
    /// Remove an entry and its tag index references.
    fn remove_entry(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            for tag in &entry.tags {
                if let Some(keys) = self.tag_index.get_mut(tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tag_index.remove(tag);
                    }
                }
            }
        }
    }
}

/// In-process TTL cache with tag invalidation.
///
/// Thread-safe, cloneable. Expired entries are evicted lazily on read and
/// in bulk by the periodic sweep.
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<RwLock<CacheInner>>,
}

impl CacheService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
        }
    }

    /// Get a value. Returns `None` for missing or expired keys.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        {
            let inner = self.inner.read().await;
            match inner.entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Expired: evict under the write lock
        let mut inner = self.inner.write().await;
        inner.remove_entry(key);
        None
    }

    /// Store a value under `key` with the given TTL and tags. Replaces any
    /// existing entry (including its old tags).
    pub async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration, tags: &[&str]) {
        let mut inner = self.inner.write().await;
        inner.remove_entry(key);

        for tag in tags {
            inner
                .tag_index
                .entry(tag.to_string())
                .or_default()
                .insert(key.to_string());
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    /// Remove a single key.
    pub async fn invalidate(&self, key: &str) {
        let mut inner = self.inner.write().await;
        inner.remove_entry(key);
    }

    /// Remove every key carrying the given tag.
    pub async fn invalidate_tag(&self, tag: &str) {
        let mut inner = self.inner.write().await;
        let keys: Vec<String> = inner
            .tag_index
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in keys {
            inner.remove_entry(&key);
        }
    }

    /// Remove all expired entries (housekeeping). Returns the eviction count.
    pub async fn sweep(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        let count = expired.len();
        for key in expired {
            inner.remove_entry(&key);
        }
        count
    }

    /// Number of live entries (expired-but-unswept included).
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new()
    }
}
