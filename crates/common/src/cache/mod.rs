//! In-memory response cache
//!
//! Provides:
//! - Generic get/set operations with TTL
//! - Get-or-load around upstream calls
//! - Expired entry purging for the periodic sweep

use crate::errors::Result;
use crate::metrics;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Time-bounded key/value cache
pub struct TtlCache<K, V> {
    name: &'static str,
    default_ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create a cache; `name` labels its hit/miss metrics
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self {
            name,
            default_ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get a live value
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let value = entries
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone());

        metrics::record_cache(value.is_some(), self.name);
        debug!(cache = self.name, key = ?key, hit = value.is_some(), "Cache lookup");
        value
    }

    /// Set a value with the default TTL
    pub async fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value with a custom TTL
    pub async fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key, Entry { value, expires_at });
    }

    /// Remove a key, returning whether a live entry was present
    pub async fn remove(&self, key: &K) -> bool {
        self.entries
            .write()
            .await
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Get or set with a loader function. Loader errors are not cached.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V>>,
    {
        if let Some(cached) = self.get(&key).await {
            return Ok(cached);
        }

        let value = loader().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// Cache key builder helpers
pub mod keys {
    /// Build an Odoo product search cache key
    pub fn odoo_products(query: &str, limit: u32) -> String {
        format!("odoo:products:{}:{}", limit, query.trim().to_lowercase())
    }

    /// Build a Toast sales page cache key
    pub fn toast_sales(start: &str, end: &str, page: u32, page_size: u32) -> String {
        format!("toast:sales:{}:{}:{}:{}", start, end, page, page_size)
    }
}
