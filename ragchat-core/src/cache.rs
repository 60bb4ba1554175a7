//! Memoizing factory for expensive collaborator handles
//!
//! Handles are keyed by the parameters they were built with and live until
//! [`ResourceCache::clear_all`]. There is no TTL and no size bound.

use dashmap::DashMap;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::errors::{RagError, Result};

/// Construction key of a cached handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    /// What kind of handle this is ("vector_store", "model", ...)
    pub kind: &'static str,
    /// Construction parameter, `None` for process-wide singletons
    pub scope: Option<String>,
}

impl ResourceKey {
    /// Key for a process-wide singleton
    pub fn singleton(kind: &'static str) -> Self {
        Self { kind, scope: None }
    }

    /// Key for a handle built from a parameter such as a username
    pub fn scoped(kind: &'static str, scope: impl Into<String>) -> Self {
        Self {
            kind,
            scope: Some(scope.into()),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}({})", self.kind, scope),
            None => write!(f, "{}", self.kind),
        }
    }
}

struct CacheEntry {
    value: Box<dyn Any + Send + Sync>,
    created_at: Instant,
    hit_count: usize,
}

#[derive(Clone, Default)]
pub struct ResourceCache {
    inner: Arc<DashMap<ResourceKey, CacheEntry>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle stored under `key`, building it with `init` on a miss.
    ///
    /// A failing `init` stores nothing, so the next call tries again.
    pub async fn get_or_try_init<T, F, Fut>(&self, key: ResourceKey, init: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(mut entry) = self.inner.get_mut(&key) {
            entry.hit_count += 1;
            return entry
                .value
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| RagError::ResourceTypeMismatch(key.to_string()));
        }

        info!("Building resource {}", key);
        let value = init().await?;

        // The map is not locked across the await; keep whichever value landed first.
        let entry = self.inner.entry(key.clone()).or_insert_with(|| CacheEntry {
            value: Box::new(value),
            created_at: Instant::now(),
            hit_count: 0,
        });

        entry
            .value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| RagError::ResourceTypeMismatch(key.to_string()))
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Drop the handle stored under `key`, returning whether there was one
    pub fn remove(&self, key: &ResourceKey) -> bool {
        let removed = self.inner.remove(key).is_some();
        if removed {
            debug!("Dropped cached resource {}", key);
        }
        removed
    }

    /// Drop every cached handle
    pub fn clear_all(&self) {
        let count = self.inner.len();
        self.inner.clear();
        info!("Cleared {} cached resources", count);
    }

    pub fn stats(&self) -> CacheStats {
        let mut total_hits = 0;
        let mut total_entries = 0;
        let mut oldest_age_secs = 0;

        for entry in self.inner.iter() {
            total_entries += 1;
            total_hits += entry.value().hit_count;
            oldest_age_secs = oldest_age_secs.max(entry.value().created_at.elapsed().as_secs());
        }

        debug!("Resource cache holds {} entries", total_entries);
        CacheStats {
            total_entries,
            total_hits,
            oldest_age_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_hits: usize,
    pub oldest_age_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Handle {
        id: usize,
    }

    async fn build(counter: &AtomicUsize) -> Result<Arc<Handle>> {
        let id = counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Handle { id }))
    }

    #[tokio::test]
    async fn test_same_key_returns_same_instance() {
        let cache = ResourceCache::new();
        let built = AtomicUsize::new(0);

        let first = cache
            .get_or_try_init(ResourceKey::scoped("vector_store", "alice"), || build(&built))
            .await
            .unwrap();
        let second = cache
            .get_or_try_init(ResourceKey::scoped("vector_store", "alice"), || build(&built))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().total_hits, 1);
    }

    #[tokio::test]
    async fn test_clear_all_forces_rebuild() {
        let cache = ResourceCache::new();
        let built = AtomicUsize::new(0);
        let key = ResourceKey::singleton("model");

        let before = cache
            .get_or_try_init(key.clone(), || build(&built))
            .await
            .unwrap();
        cache.clear_all();
        assert!(!cache.contains(&key));

        let after = cache
            .get_or_try_init(key, || build(&built))
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.id, 1);
    }

    #[tokio::test]
    async fn test_distinct_scopes_are_distinct_handles() {
        let cache = ResourceCache::new();
        let built = AtomicUsize::new(0);

        let alice = cache
            .get_or_try_init(ResourceKey::scoped("vector_store", "alice"), || build(&built))
            .await
            .unwrap();
        let bob = cache
            .get_or_try_init(ResourceKey::scoped("vector_store", "bob"), || build(&built))
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&alice, &bob));
        assert_eq!(cache.stats().total_entries, 2);
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let cache = ResourceCache::new();
        let key = ResourceKey::singleton("embedding");

        let failed: Result<Arc<Handle>> = cache
            .get_or_try_init(key.clone(), || async {
                Err(RagError::ConfigError("missing api key".to_string()))
            })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains(&key));

        let built = AtomicUsize::new(0);
        assert!(cache.get_or_try_init(key, || build(&built)).await.is_ok());
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let cache = ResourceCache::new();
        let key = ResourceKey::singleton("model");
        cache
            .get_or_try_init(key.clone(), || async { Ok(42_u32) })
            .await
            .unwrap();

        let wrong: Result<String> = cache
            .get_or_try_init(key, || async { Ok(String::new()) })
            .await;
        assert!(matches!(wrong, Err(RagError::ResourceTypeMismatch(_))));
    }
}
