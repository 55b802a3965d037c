//! State and plumbing shared by the three adapter archetypes
//!
//! Scope checking, cache lookup/store, throttled and cancellable upstream
//! calls, and item validation all live here so every archetype applies
//! them the same way.

use super::traits::{AdapterMetadata, DEFAULT_WEIGHT};
use crate::cache::{CacheKey, CacheLookup, LazyCache, ResultCache};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::error::QueryError;
use crate::fetch::{BoxPaginator, Paginator, DEFAULT_MAX_PARALLEL};
use crate::identity::{parse_identifier, validate_scope, Identifier};
use crate::item::{Item, QueryMethod};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Tunables applied to an adapter at construction.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub cache_duration: Duration,
    pub weight: i32,
    /// Parallel gets during always-get list fan-out, and parallel tag
    /// fetches for get-list adapters
    pub max_parallel: usize,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(crate::config::DEFAULT_CACHE_DURATION_SECS),
            weight: DEFAULT_WEIGHT,
            max_parallel: DEFAULT_MAX_PARALLEL,
            rate_limiter: None,
        }
    }
}

impl AdapterSettings {
    /// Settings from engine configuration. The rate limiter is not
    /// started here; attach one with [`with_rate_limiter`](Self::with_rate_limiter).
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            cache_duration: config.cache_duration(),
            weight: config.default_weight,
            max_parallel: config.max_parallel,
            rate_limiter: None,
        }
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }
}

pub(crate) struct AdapterCore {
    pub(crate) item_type: String,
    pub(crate) name: String,
    pub(crate) scope: String,
    pub(crate) settings: AdapterSettings,
    pub(crate) metadata: AdapterMetadata,
    cache: LazyCache,
}

impl AdapterCore {
    pub(crate) fn new(item_type: String, scope: String) -> Self {
        let name = format!("{}-adapter", item_type);
        let metadata = AdapterMetadata::new(item_type.clone(), item_type.clone());
        Self {
            item_type,
            name,
            scope,
            settings: AdapterSettings::default(),
            metadata,
            cache: LazyCache::new(),
        }
    }

    pub(crate) fn apply_config(&mut self, config: &EngineConfig) {
        let rate_limiter = self.settings.rate_limiter.take();
        self.settings = AdapterSettings {
            rate_limiter,
            ..AdapterSettings::from_config(config)
        };
    }

    pub(crate) fn cache(&self) -> &Arc<ResultCache> {
        self.cache.get()
    }

    /// Attach adapter context to an error
    pub(crate) fn fail(&self, err: QueryError, scope: &str) -> QueryError {
        err.in_context(&self.name, scope, &self.item_type)
    }

    pub(crate) fn check_scope(&self, scope: &str) -> Result<(), QueryError> {
        validate_scope(scope, &self.scope).map_err(|err| self.fail(err, scope))
    }

    pub(crate) fn lookup(
        &self,
        method: QueryMethod,
        scope: &str,
        query: &str,
        ignore_cache: bool,
    ) -> CacheLookup {
        self.cache()
            .lookup(&self.name, method, scope, &self.item_type, query, ignore_cache)
    }

    pub(crate) fn store_items(&self, items: Vec<Item>, key: CacheKey) {
        self.cache()
            .store_items(items, self.settings.cache_duration, key);
    }

    /// Negative-cache the error if its kind allows, then return it with
    /// adapter context attached.
    pub(crate) fn store_error(&self, err: QueryError, scope: &str, key: CacheKey) -> QueryError {
        let err = self.fail(err, scope);
        if self
            .cache()
            .store_error(err.clone(), self.settings.cache_duration, key)
        {
            tracing::debug!(adapter = %self.name, scope, error = %err, "negative-cached error");
        }
        err
    }

    /// Run one upstream call: take a rate-limit token, then race the call
    /// against cancellation.
    pub(crate) async fn upstream<T, F>(&self, cancel: &CancellationToken, call: F) -> Result<T, QueryError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        throttled(self.settings.rate_limiter.as_ref(), cancel, call).await
    }

    pub(crate) fn not_found(&self, scope: &str, query: &str) -> QueryError {
        self.fail(
            QueryError::not_found(format!("{} {} not found", self.item_type, query)),
            scope,
        )
    }

    /// Enforce the unique-attribute invariant on a mapped item.
    pub(crate) fn check_item(&self, item: Item, scope: &str) -> Result<Item, QueryError> {
        item.validate()
            .map_err(|err| self.fail(QueryError::other(err.to_string()), scope))?;
        Ok(item)
    }

    /// Parse an identifier search term and make sure it belongs to the
    /// requested scope.
    pub(crate) fn identifier_in_scope(&self, scope: &str, query: &str) -> Result<Identifier, QueryError> {
        let identifier = parse_identifier(query).map_err(|err| {
            self.fail(
                QueryError::other(format!("search query is not a valid identifier: {}", err)),
                scope,
            )
        })?;

        let identifier_scope = identifier.scope();
        if identifier_scope != scope {
            return Err(self.fail(
                QueryError::no_scope(format!(
                    "identifier scope {} does not match request scope {}",
                    identifier_scope, scope
                )),
                scope,
            ));
        }
        Ok(identifier)
    }
}

/// Paginator whose page requests each take a rate-limit token.
pub(crate) struct ThrottledPaginator<P> {
    inner: BoxPaginator<P>,
    limiter: Option<Arc<RateLimiter>>,
}

impl<P> ThrottledPaginator<P> {
    pub(crate) fn new(inner: BoxPaginator<P>, limiter: Option<Arc<RateLimiter>>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<P: Send + 'static> Paginator for ThrottledPaginator<P> {
    type Page = P;

    fn has_more_pages(&self) -> bool {
        self.inner.has_more_pages()
    }

    async fn next_page(&mut self, cancel: &CancellationToken) -> Result<P, QueryError> {
        throttled(self.limiter.as_ref(), cancel, self.inner.next_page(cancel)).await
    }
}

/// Take a token from `limiter` (when present) and run `call` unless
/// `cancel` fires first.
pub(crate) async fn throttled<T, F>(
    limiter: Option<&Arc<RateLimiter>>,
    cancel: &CancellationToken,
    call: F,
) -> Result<T, QueryError>
where
    F: Future<Output = Result<T, QueryError>>,
{
    if let Some(limiter) = limiter {
        limiter.acquire(cancel).await?;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(QueryError::cancelled()),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::format_scope;

    fn adapter_core() -> AdapterCore {
        AdapterCore::new("ecs-task".to_string(), format_scope("052392120703", "eu-west-1"))
    }

    #[test]
    fn name_is_derived_from_type() {
        assert_eq!(adapter_core().name, "ecs-task-adapter");
    }

    #[test]
    fn cache_is_built_lazily() {
        let shared = adapter_core();
        assert!(!shared.cache.is_initialized());
        let _ = shared.lookup(QueryMethod::Get, "052392120703.eu-west-1", "x", false);
        assert!(shared.cache.is_initialized());
    }

    #[test]
    fn identifier_from_other_account_is_noscope() {
        let err = adapter_core()
            .identifier_in_scope(
                "052392120703.eu-west-1",
                "arn:aws:ecs:eu-west-1:999999999999:task/cluster/abc",
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoScope);
        assert_eq!(err.source_name, "ecs-task-adapter");
    }

    #[test]
    fn malformed_identifier_is_other() {
        let err = adapter_core()
            .identifier_in_scope("052392120703.eu-west-1", "abc")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }

    #[test]
    fn store_error_skips_transient_kinds() {
        let shared = adapter_core();
        let scope = "052392120703.eu-west-1";
        let key = shared.lookup(QueryMethod::Get, scope, "abc", false).key;
        let err = shared.store_error(QueryError::upstream("throttled"), scope, key);
        assert_eq!(err.item_type, "ecs-task");
        assert!(shared.cache().is_empty());
    }

    #[tokio::test]
    async fn upstream_respects_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), QueryError> = adapter_core()
            .upstream(&cancel, async { Ok(()) })
            .await;
        assert_eq!(result.unwrap_err().message, "operation cancelled");
    }
}
