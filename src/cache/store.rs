//! TTL result cache with negative caching
//!
//! Stores either a list of items or a single error per [`CacheKey`].
//! Only structurally permanent errors (`NOTFOUND`, `NOSCOPE`) are ever
//! stored; anything else is retried upstream on the next call.

use super::key::CacheKey;
use crate::cancel::CancellationToken;
use crate::error::QueryError;
use crate::item::{Item, QueryMethod};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What a cache slot holds
#[derive(Debug, Clone)]
pub enum CachedResult {
    Items(Vec<Item>),
    Error(QueryError),
}

impl CachedResult {
    pub fn into_result(self) -> Result<Vec<Item>, QueryError> {
        match self {
            CachedResult::Items(items) => Ok(items),
            CachedResult::Error(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CachedResult,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of [`ResultCache::lookup`].
///
/// The key is returned on a miss too, so the caller can store the fresh
/// result under it.
#[derive(Debug)]
pub struct CacheLookup {
    pub key: CacheKey,
    pub cached: Option<CachedResult>,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        self.cached.is_some()
    }
}

/// Concurrent TTL cache shared by all calls on one adapter.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached result.
    ///
    /// `ignore_cache` forces a miss; a subsequent store under the returned
    /// key still refreshes the entry. Expired entries are evicted and
    /// reported as misses.
    pub fn lookup(
        &self,
        adapter_name: &str,
        method: QueryMethod,
        scope: &str,
        item_type: &str,
        query: &str,
        ignore_cache: bool,
    ) -> CacheLookup {
        let key = CacheKey::new(adapter_name, method, scope, item_type, query);

        if ignore_cache {
            tracing::debug!(key = %key, "cache bypassed");
            return CacheLookup { key, cached: None };
        }

        let now = Instant::now();
        let cached = match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.result.clone()),
            Some(_) => None,
            None => None,
        };

        if cached.is_none() {
            // The read guard is dropped above; removing here cannot deadlock.
            self.entries.remove_if(&key, |_, entry| entry.is_expired(now));
            tracing::debug!(key = %key, "cache miss");
        } else {
            tracing::debug!(key = %key, "cache hit");
        }

        CacheLookup { key, cached }
    }

    /// Replace the entry under `key` with `items`, resetting its TTL.
    ///
    /// A TTL too large to represent as a deadline stores nothing.
    pub fn store_items(&self, items: Vec<Item>, ttl: Duration, key: CacheKey) {
        let Some(expires_at) = deadline(ttl, &key) else {
            return;
        };
        self.entries.insert(
            key,
            CacheEntry {
                result: CachedResult::Items(items),
                expires_at,
            },
        );
    }

    /// Store an error under `key` if its kind is cacheable.
    ///
    /// Returns whether the error was stored.
    pub fn store_error(&self, err: QueryError, ttl: Duration, key: CacheKey) -> bool {
        if !err.kind.is_cacheable() {
            return false;
        }
        let Some(expires_at) = deadline(ttl, &key) else {
            return false;
        };
        self.entries.insert(
            key,
            CacheEntry {
                result: CachedResult::Error(err),
                expires_at,
            },
        );
        true
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Run [`purge`](Self::purge) every `interval` until `cancel` fires.
    pub fn start_purger(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge();
                        if purged > 0 {
                            tracing::debug!(purged, "purged expired cache entries");
                        }
                    }
                }
            }
        });
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn deadline(ttl: Duration, key: &CacheKey) -> Option<Instant> {
    let expires_at = Instant::now().checked_add(ttl);
    if expires_at.is_none() {
        tracing::warn!(key = %key, ttl = ?ttl, "cache duration overflows the clock; result not cached");
    }
    expires_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::item::Attributes;

    const TTL: Duration = Duration::from_secs(60);

    fn item(name: &str) -> Item {
        let mut attrs = Attributes::new();
        attrs.insert("name", name);
        Item::new("ecs-cluster", "name", attrs, "123.eu-west-1")
    }

    fn lookup(cache: &ResultCache, query: &str, ignore: bool) -> CacheLookup {
        cache.lookup(
            "ecs-cluster-adapter",
            QueryMethod::Get,
            "123.eu-west-1",
            "ecs-cluster",
            query,
            ignore,
        )
    }

    #[test]
    fn miss_then_hit() {
        let cache = ResultCache::new();
        let first = lookup(&cache, "prod", false);
        assert!(!first.is_hit());

        cache.store_items(vec![item("prod")], TTL, first.key);

        let second = lookup(&cache, "prod", false);
        let items = second.cached.unwrap().into_result().unwrap();
        assert_eq!(items, vec![item("prod")]);
    }

    #[test]
    fn ignore_cache_forces_miss_but_returns_key() {
        let cache = ResultCache::new();
        let key = lookup(&cache, "prod", false).key;
        cache.store_items(vec![item("prod")], TTL, key.clone());

        let bypass = lookup(&cache, "prod", true);
        assert!(!bypass.is_hit());
        assert_eq!(bypass.key, key);
    }

    #[test]
    fn keys_distinguish_method_and_query() {
        let cache = ResultCache::new();
        let key = lookup(&cache, "prod", false).key;
        cache.store_items(vec![item("prod")], TTL, key);

        assert!(!lookup(&cache, "staging", false).is_hit());
        let list = cache.lookup(
            "ecs-cluster-adapter",
            QueryMethod::List,
            "123.eu-west-1",
            "ecs-cluster",
            "prod",
            false,
        );
        assert!(!list.is_hit());
    }

    #[test]
    fn only_permanent_errors_are_stored() {
        let cache = ResultCache::new();
        let key = lookup(&cache, "gone", false).key;

        assert!(!cache.store_error(QueryError::upstream("throttled"), TTL, key.clone()));
        assert!(!cache.store_error(QueryError::other("two items"), TTL, key.clone()));
        assert!(cache.is_empty());

        assert!(cache.store_error(QueryError::not_found("gone"), TTL, key));
        let err = lookup(&cache, "gone", false)
            .cached
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn unrepresentable_ttl_skips_the_store() {
        let cache = ResultCache::new();
        let key = lookup(&cache, "prod", false).key;

        cache.store_items(vec![item("prod")], Duration::MAX, key.clone());
        assert!(!cache.store_error(QueryError::not_found("gone"), Duration::MAX, key));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResultCache::new();
        let key = lookup(&cache, "prod", false).key;
        cache.store_items(vec![item("prod")], Duration::from_secs(5), key);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(lookup(&cache, "prod", false).is_hit());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!lookup(&cache, "prod", false).is_hit());
        assert!(cache.is_empty(), "expired entry evicted on lookup");
    }

    #[tokio::test(start_paused = true)]
    async fn store_resets_ttl() {
        let cache = ResultCache::new();
        let key = lookup(&cache, "prod", false).key;
        cache.store_items(vec![item("prod")], Duration::from_secs(5), key.clone());

        tokio::time::advance(Duration::from_secs(4)).await;
        cache.store_items(vec![item("prod")], Duration::from_secs(5), key);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(lookup(&cache, "prod", false).is_hit());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache = ResultCache::new();
        let short = lookup(&cache, "a", false).key;
        let long = lookup(&cache, "b", false).key;
        cache.store_items(vec![item("a")], Duration::from_secs(1), short);
        cache.store_items(vec![item("b")], Duration::from_secs(100), long);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_purger_runs_until_cancelled() {
        let cache = Arc::new(ResultCache::new());
        let key = lookup(&cache, "a", false).key;
        cache.store_items(vec![item("a")], Duration::from_secs(1), key);

        let cancel = CancellationToken::new();
        cache.start_purger(Duration::from_secs(10), cancel.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty());
        cancel.cancel();
    }
}
