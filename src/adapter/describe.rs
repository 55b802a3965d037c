//! Describe-only adapters
//!
//! For APIs where one "describe" call answers both Get (with a filtering
//! input) and List (with an open input, usually paginated).

use super::common::{AdapterCore, AdapterSettings};
use super::traits::{Adapter, AdapterMetadata};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::cache::ResultCache;
use crate::error::{QueryError, QueryResult};
use crate::fetch::BoxPaginator;
use crate::item::{Item, QueryMethod};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// The upstream describe call
pub type DescribeFn<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync>;

/// `(scope, query)` to describe input
pub type QueryInputMapper<I> = Arc<dyn Fn(&str, &str) -> Result<I, QueryError> + Send + Sync>;

/// `scope` to describe input
pub type ScopeInputMapper<I> = Arc<dyn Fn(&str) -> Result<I, QueryError> + Send + Sync>;

/// Builds a paginator over describe outputs for one input
pub type PaginatorBuilder<I, O> = Arc<dyn Fn(I) -> BoxPaginator<O> + Send + Sync>;

/// `(scope, input, output)` to items
pub type OutputMapper<I, O> = Arc<dyn Fn(&str, &I, O) -> Result<Vec<Item>, QueryError> + Send + Sync>;

/// Adapter over a single upstream describe operation.
pub struct DescribeOnlyAdapter<I, O> {
    core: AdapterCore,
    describe: Option<DescribeFn<I, O>>,
    get_input_mapper: Option<QueryInputMapper<I>>,
    list_input_mapper: Option<ScopeInputMapper<I>>,
    search_input_mapper: Option<QueryInputMapper<I>>,
    paginator_builder: Option<PaginatorBuilder<I, O>>,
    output_mapper: Option<OutputMapper<I, O>>,
    use_list_for_get: bool,
}

impl<I, O> DescribeOnlyAdapter<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new(item_type: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            core: AdapterCore::new(item_type.into(), scope.into()),
            describe: None,
            get_input_mapper: None,
            list_input_mapper: None,
            search_input_mapper: None,
            paginator_builder: None,
            output_mapper: None,
            use_list_for_get: false,
        }
    }

    pub fn with_describe<F, Fut>(mut self, describe: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, QueryError>> + Send + 'static,
    {
        self.describe = Some(Arc::new(move |input| describe(input).boxed()));
        self
    }

    pub fn with_get_input_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str, &str) -> Result<I, QueryError> + Send + Sync + 'static,
    {
        self.get_input_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn with_list_input_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str) -> Result<I, QueryError> + Send + Sync + 'static,
    {
        self.list_input_mapper = Some(Arc::new(mapper));
        self
    }

    /// Replace identifier search with a describe against a custom input.
    pub fn with_search_input_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str, &str) -> Result<I, QueryError> + Send + Sync + 'static,
    {
        self.search_input_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn with_paginator_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(I) -> BoxPaginator<O> + Send + Sync + 'static,
    {
        self.paginator_builder = Some(Arc::new(builder));
        self
    }

    pub fn with_output_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str, &I, O) -> Result<Vec<Item>, QueryError> + Send + Sync + 'static,
    {
        self.output_mapper = Some(Arc::new(mapper));
        self
    }

    /// Run Get through the paginated describe path.
    pub fn use_list_for_get(mut self, enabled: bool) -> Self {
        self.use_list_for_get = enabled;
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

    /// Take cache TTL, weight and parallelism from engine configuration,
    /// keeping any attached rate limiter.
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
        let missing = if self.describe.is_none() {
            Some("describe function")
        } else if self.get_input_mapper.is_none() {
            Some("get input mapper")
        } else if self.list_input_mapper.is_none() {
            Some("list input mapper")
        } else if self.output_mapper.is_none() {
            Some("output mapper")
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

    /// Run the describe for `input` and map every output to items.
    async fn describe_items(
        &self,
        scope: &str,
        input: I,
        paginate: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError> {
        let (Some(describe), Some(output_mapper)) = (&self.describe, &self.output_mapper) else {
            return Err(QueryError::other("describe adapter is not configured"));
        };

        let mut items = Vec::new();
        match (&self.paginator_builder, paginate) {
            (Some(builder), true) => {
                let mut pages = builder(input.clone());
                while pages.has_more_pages() {
                    let page = self.core.upstream(cancel, pages.next_page(cancel)).await?;
                    items.extend(output_mapper(scope, &input, page)?);
                }
            }
            _ => {
                tracing::debug!(adapter = %self.core.name, scope, "describe");
                let output = self.core.upstream(cancel, describe(input.clone())).await?;
                items.extend(output_mapper(scope, &input, output)?);
            }
        }

        items
            .into_iter()
            .map(|item| self.core.check_item(item, scope))
            .collect()
    }

    async fn fetch_one(&self, scope: &str, query: &str, cancel: &CancellationToken) -> Result<Item, QueryError> {
        let Some(mapper) = &self.get_input_mapper else {
            return Err(QueryError::other("get input mapper is not configured"));
        };
        let input = mapper(scope, query)?;
        let mut items = self
            .describe_items(scope, input, self.use_list_for_get, cancel)
            .await?;

        match items.len() {
            0 => Err(self.core.not_found(scope, query)),
            1 => Ok(items.remove(0)),
            n => {
                let names: Vec<String> = items.iter().map(Item::globally_unique_name).collect();
                Err(QueryError::other(format!(
                    "expected one {} for query {:?}, got {}: {}",
                    self.core.item_type,
                    query,
                    n,
                    names.join(", ")
                )))
            }
        }
    }

    async fn fetch_all(&self, scope: &str, cancel: &CancellationToken) -> Result<Vec<Item>, QueryError> {
        let Some(mapper) = &self.list_input_mapper else {
            return Err(QueryError::other("list input mapper is not configured"));
        };
        let input = mapper(scope)?;
        self.describe_items(scope, input, true, cancel).await
    }

    async fn fetch_search(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError> {
        if let Some(mapper) = &self.search_input_mapper {
            let input = mapper(scope, query)?;
            return self.describe_items(scope, input, true, cancel).await;
        }

        let identifier = self.core.identifier_in_scope(scope, query)?;
        let item = self
            .get(scope, identifier.resource_id(), ignore_cache, cancel)
            .await?;
        Ok(vec![item])
    }
}

#[async_trait]
impl<I, O> Adapter for DescribeOnlyAdapter<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
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
