//! Get-list adapters
//!
//! For APIs whose get and list calls both return full detail, so each raw
//! resource maps straight to an item.

use super::common::{throttled, AdapterCore, AdapterSettings};
use super::traits::{Adapter, AdapterMetadata};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::cache::ResultCache;
use crate::error::{QueryError, QueryResult};
use crate::item::{Item, QueryMethod};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// `(scope, query)` to one raw resource
pub type ResourceGetFn<R> = Arc<dyn Fn(String, String) -> BoxFuture<'static, Result<R, QueryError>> + Send + Sync>;

/// `scope` to every raw resource
pub type ResourceListFn<R> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<R>, QueryError>> + Send + Sync>;

/// `(scope, query)` to matching raw resources
pub type ResourceSearchFn<R> =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, Result<Vec<R>, QueryError>> + Send + Sync>;

/// `(query, scope, resource)` to an item. The query is `None` during List.
pub type ItemMapper<R> = Arc<dyn Fn(Option<&str>, &str, &R) -> Result<Item, QueryError> + Send + Sync>;

/// Fetch tags for one resource
pub type TagsFn<R> =
    Arc<dyn Fn(&R) -> BoxFuture<'static, Result<BTreeMap<String, String>, QueryError>> + Send + Sync>;

/// Adapter whose get and list both return full resources.
pub struct GetListAdapter<R> {
    core: AdapterCore,
    get: Option<ResourceGetFn<R>>,
    list: Option<ResourceListFn<R>>,
    search: Option<ResourceSearchFn<R>>,
    item_mapper: Option<ItemMapper<R>>,
    list_tags: Option<TagsFn<R>>,
    disable_list: bool,
}

impl<R> GetListAdapter<R>
where
    R: Send + Sync + 'static,
{
    pub fn new(item_type: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            core: AdapterCore::new(item_type.into(), scope.into()),
            get: None,
            list: None,
            search: None,
            item_mapper: None,
            list_tags: None,
            disable_list: false,
        }
    }

    pub fn with_get<F, Fut>(mut self, get: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, QueryError>> + Send + 'static,
    {
        self.get = Some(Arc::new(move |scope, query| get(scope, query).boxed()));
        self
    }

    pub fn with_list<F, Fut>(mut self, list: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, QueryError>> + Send + 'static,
    {
        self.list = Some(Arc::new(move |scope| list(scope).boxed()));
        self
    }

    /// Replace identifier search with a custom search call.
    pub fn with_search<F, Fut>(mut self, search: F) -> Self
    where
        F: Fn(String, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, QueryError>> + Send + 'static,
    {
        self.search = Some(Arc::new(move |scope, query| search(scope, query).boxed()));
        self
    }

    pub fn with_item_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Option<&str>, &str, &R) -> Result<Item, QueryError> + Send + Sync + 'static,
    {
        self.item_mapper = Some(Arc::new(mapper));
        self
    }

    /// Attach tags fetched by a separate call to every mapped item. A
    /// failed fetch becomes a single `error` tag.
    pub fn with_list_tags<F, Fut>(mut self, list_tags: F) -> Self
    where
        F: Fn(&R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BTreeMap<String, String>, QueryError>> + Send + 'static,
    {
        self.list_tags = Some(Arc::new(move |resource: &R| list_tags(resource).boxed()));
        self
    }

    /// Make List return nothing. Search is unaffected.
    pub fn disable_list(mut self, disabled: bool) -> Self {
        self.disable_list = disabled;
        self
    }

    /// Override the default `{type}-adapter` name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.core.name = name.into();
        self
    }

    pub fn with_settings(mut self, settings: AdapterSettings) -> Self {
        self.core.settings = settings;
        self
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.core.apply_config(config);
        self
    }

    pub fn with_metadata(mut self, metadata: AdapterMetadata) -> Self {
        self.core.metadata = metadata;
        self
    }

    /// The adapter's result cache, built on first use. Exposed so callers
    /// can run a purger or clear it.
    pub fn cache(&self) -> &Arc<ResultCache> {
        self.core.cache()
    }

    /// Report the first missing required collaborator.
    pub fn validate(&self) -> Result<(), QueryError> {
        let missing = if self.get.is_none() {
            Some("get function")
        } else if self.list.is_none() {
            Some("list function")
        } else if self.item_mapper.is_none() {
            Some("item mapper")
        } else {
            None
        };

        match missing {
            Some(what) => Err(QueryError::other(format!(
                "{} is not configured: missing {}",
                self.core.name, what
            ))),
            None => Ok(()),
        }
    }

    fn ready(&self, scope: &str) -> Result<(), QueryError> {
        self.core.check_scope(scope)?;
        self.validate().map_err(|err| self.core.fail(err, scope))
    }

    fn mapper(&self) -> Result<&ItemMapper<R>, QueryError> {
        self.item_mapper
            .as_ref()
            .ok_or_else(|| QueryError::other("item mapper is not configured"))
    }

    /// Map one resource and attach its tags.
    async fn to_item(
        &self,
        query: Option<&str>,
        scope: &str,
        resource: &R,
        cancel: &CancellationToken,
    ) -> Result<Item, QueryError> {
        let mapper = self.mapper()?;
        let item = self.core.check_item(mapper(query, scope, resource)?, scope)?;

        let Some(list_tags) = &self.list_tags else {
            return Ok(item);
        };
        let tags = throttled(self.core.settings.rate_limiter.as_ref(), cancel, list_tags(resource)).await;
        Ok(match tags {
            Ok(tags) => item.with_tags(tags),
            Err(_) if cancel.is_cancelled() => return Err(QueryError::cancelled()),
            Err(err) => {
                tracing::warn!(
                    adapter = %self.core.name,
                    scope,
                    item = %item.unique_attribute_value(),
                    error = %err,
                    "tag fetch failed"
                );
                item.with_tags(BTreeMap::from([("error".to_string(), err.to_string())]))
            }
        })
    }

    /// Map every resource, skipping the ones that fail. At most
    /// `max_parallel` tag fetches run at once. Cancellation fails the whole
    /// call rather than returning the items that finished first.
    async fn to_items(
        &self,
        scope: &str,
        resources: Vec<R>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError> {
        let pending: Vec<_> = resources
            .iter()
            .map(|resource| self.to_item(None, scope, resource, cancel))
            .collect();
        let mapped: Vec<Result<Item, QueryError>> = stream::iter(pending)
        .buffer_unordered(self.core.settings.max_parallel.max(1))
        .collect()
        .await;

        if cancel.is_cancelled() {
            return Err(QueryError::cancelled());
        }

        Ok(mapped
            .into_iter()
            .filter_map(|result| match result {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::warn!(adapter = %self.core.name, scope, error = %err, "skipping item that failed to map");
                    None
                }
            })
            .collect())
    }

    async fn fetch_one(&self, scope: &str, query: &str, cancel: &CancellationToken) -> Result<Item, QueryError> {
        let Some(get) = &self.get else {
            return Err(QueryError::other("get function is not configured"));
        };
        tracing::debug!(adapter = %self.core.name, scope, query, "get");
        let resource = self
            .core
            .upstream(cancel, get(scope.to_string(), query.to_string()))
            .await?;
        self.to_item(Some(query), scope, &resource, cancel).await
    }

    async fn fetch_all(&self, scope: &str, cancel: &CancellationToken) -> Result<Vec<Item>, QueryError> {
        let Some(list) = &self.list else {
            return Err(QueryError::other("list function is not configured"));
        };
        tracing::debug!(adapter = %self.core.name, scope, "list");
        let resources = self.core.upstream(cancel, list(scope.to_string())).await?;
        self.to_items(scope, resources, cancel).await
    }

    async fn fetch_search(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError> {
        if let Some(search) = &self.search {
            tracing::debug!(adapter = %self.core.name, scope, query, "search");
            let resources = self
                .core
                .upstream(cancel, search(scope.to_string(), query.to_string()))
                .await?;
            return self.to_items(scope, resources, cancel).await;
        }

        let identifier = self.core.identifier_in_scope(scope, query)?;
        let item = self
            .get(scope, identifier.resource_id(), ignore_cache, cancel)
            .await?;
        Ok(vec![item])
    }
}

#[async_trait]
impl<R> Adapter for GetListAdapter<R>
where
    R: Send + Sync + 'static,
{
    fn item_type(&self) -> &str {
        &self.core.item_type
    }

    fn name(&self) -> &str {
        &self.core.name
    }

    fn scopes(&self) -> Vec<String> {
        vec![self.core.scope.clone()]
    }

    fn weight(&self) -> i32 {
        self.core.settings.weight
    }

    fn metadata(&self) -> &AdapterMetadata {
        &self.core.metadata
    }

    async fn get(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Item> {
        self.ready(scope)?;

        let lookup = self.core.lookup(QueryMethod::Get, scope, query, ignore_cache);
        if let Some(cached) = lookup.cached {
            return cached
                .into_result()?
                .into_iter()
                .next()
                .ok_or_else(|| self.core.not_found(scope, query));
        }

        match self.fetch_one(scope, query, cancel).await {
            Ok(item) => {
                self.core.store_items(vec![item.clone()], lookup.key);
                Ok(item)
            }
            Err(err) => Err(self.core.store_error(err, scope, lookup.key)),
        }
    }

    async fn list(
        &self,
        scope: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Item>> {
        self.ready(scope)?;
        if self.disable_list {
            return Ok(Vec::new());
        }

        let lookup = self.core.lookup(QueryMethod::List, scope, "", ignore_cache);
        if let Some(cached) = lookup.cached {
            return cached.into_result();
        }

        match self.fetch_all(scope, cancel).await {
            Ok(items) => {
                self.core.store_items(items.clone(), lookup.key);
                Ok(items)
            }
            Err(err) => Err(self.core.store_error(err, scope, lookup.key)),
        }
    }

    async fn search(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Item>> {
        self.ready(scope)?;

        let lookup = self.core.lookup(QueryMethod::Search, scope, query, ignore_cache);
        if let Some(cached) = lookup.cached {
            return cached.into_result();
        }

        match self.fetch_search(scope, query, ignore_cache, cancel).await {
            Ok(items) => {
                self.core.store_items(items.clone(), lookup.key);
                Ok(items)
            }
            Err(err) => Err(self.core.store_error(err, scope, lookup.key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::item::Attributes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SCOPE: &str = "052392120703";

    #[derive(Debug, Clone)]
    struct Bucket {
        name: String,
    }

    fn bucket(name: &str) -> Bucket {
        Bucket {
            name: name.to_string(),
        }
    }

    fn adapter(names: &[&str]) -> GetListAdapter<Bucket> {
        let listed: Vec<Bucket> = names.iter().map(|n| bucket(n)).collect();
        GetListAdapter::new("s3-bucket", SCOPE)
            .with_get(|_scope: String, query: String| async move {
                if query == "gone" {
                    Err(QueryError::not_found("no such bucket"))
                } else {
                    Ok(bucket(&query))
                }
            })
            .with_list(move |_scope: String| {
                let listed = listed.clone();
                async move { Ok(listed) }
            })
            .with_item_mapper(|_query: Option<&str>, scope: &str, resource: &Bucket| {
                let mut attrs = Attributes::new();
                attrs.insert("name", resource.name.clone());
                Ok(Item::new("s3-bucket", "name", attrs, scope))
            })
    }

    #[tokio::test]
    async fn list_skips_items_that_fail_to_map() {
        let adapter = adapter(&["logs", "", "assets"]);
        let items = adapter
            .list(SCOPE, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn tags_are_attached_and_failures_recorded() {
        let adapter = adapter(&["logs", "private"]).with_list_tags(|resource: &Bucket| {
            let name = resource.name.clone();
            async move {
                if name == "private" {
                    Err(QueryError::upstream("access denied"))
                } else {
                    Ok(BTreeMap::from([("team".to_string(), "platform".to_string())]))
                }
            }
        });

        let mut items = adapter
            .list(SCOPE, false, &CancellationToken::new())
            .await
            .unwrap();
        items.sort_by_key(Item::unique_attribute_value);

        assert_eq!(items[0].tags.get("team").map(String::as_str), Some("platform"));
        assert_eq!(
            items[1].tags.get("error").map(String::as_str),
            Some("UPSTREAM: access denied")
        );
    }

    #[tokio::test]
    async fn get_maps_the_resource() {
        let item = adapter(&[])
            .get(SCOPE, "logs", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(item.globally_unique_name(), "052392120703.s3-bucket.logs");
    }

    #[tokio::test]
    async fn wrong_scope_is_rejected() {
        let err = adapter(&["logs"])
            .list("111111111111", false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoScope);
    }

    #[tokio::test]
    async fn custom_search_replaces_identifier_search() {
        let adapter = adapter(&[]).with_search(|_scope: String, query: String| async move {
            Ok(vec![bucket(&format!("{}-a", query)), bucket(&format!("{}-b", query))])
        });
        let items = adapter
            .search(SCOPE, "logs", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn identifier_search_uses_resource_id() {
        let items = adapter(&[])
            .search(SCOPE, "arn:aws:s3::052392120703:logs", false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(items[0].unique_attribute_value(), "logs");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn tag_fetches_respect_max_parallel() {
        let names: Vec<String> = (0..30).map(|i| format!("bucket-{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let adapter = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            adapter(&refs)
                .with_settings(AdapterSettings::default().with_max_parallel(3))
                .with_list_tags(move |_resource: &Bucket| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(BTreeMap::new())
                    }
                })
        };

        let items = adapter
            .list(SCOPE, false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(items.len(), 30);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak tag fetches was {}", peak);
    }

    #[tokio::test]
    async fn cancelled_tag_fetch_is_not_cached() {
        let adapter = adapter(&["logs", "assets"]).with_list_tags(|_resource: &Bucket| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(BTreeMap::from([("team".to_string(), "platform".to_string())]))
        });

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };
        let err = adapter.list(SCOPE, false, &cancel).await.unwrap_err();
        canceller.await.unwrap();
        assert_eq!(err.kind, ErrorKind::Other);

        let err = adapter.get(SCOPE, "logs", false, &cancel).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);

        let fresh = CancellationToken::new();
        let items = adapter.list(SCOPE, false, &fresh).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.tags.get("team").is_some()));

        let item = adapter.get(SCOPE, "logs", false, &fresh).await.unwrap();
        assert!(!item.tags.contains_key("error"));
    }
}
