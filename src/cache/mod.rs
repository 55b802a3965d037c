//! In-memory TTL result cache

mod key;
mod store;

pub use key::CacheKey;
pub use store::{CacheLookup, CachedResult, ResultCache};

use std::sync::{Arc, OnceLock};

/// A cache that is constructed on first use, exactly once.
///
/// Concurrent first callers race on the `OnceLock`; only one cache is
/// ever built. After that every call goes straight to the cache's own
/// sharded map.
#[derive(Debug, Default)]
pub struct LazyCache {
    cell: OnceLock<Arc<ResultCache>>,
}

impl LazyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &Arc<ResultCache> {
        self.cell.get_or_init(|| Arc::new(ResultCache::new()))
    }

    /// Whether the cache has been built yet
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}
