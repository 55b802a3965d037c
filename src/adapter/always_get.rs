//! Always-get adapters
//!
//! For APIs whose list call only returns identifiers. List pages through
//! those identifiers and resolves each one with a get, in parallel, through
//! the [`FetchPipeline`].

use super::common::{throttled, AdapterCore, AdapterSettings, ThrottledPaginator};
use super::traits::{Adapter, AdapterMetadata};
use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::cache::ResultCache;
use crate::error::{QueryError, QueryResult};
use crate::fetch::{get_fn, BoxPaginator, FetchPipeline, GetFn};
use crate::identity::parse_identifier;
use crate::item::{Item, QueryMethod};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// `(scope, get input)` to a fully populated item
pub type ItemGetFn<GI> = Arc<dyn Fn(String, GI) -> BoxFuture<'static, Result<Item, QueryError>> + Send + Sync>;

/// Builds a paginator over list pages for one list input
pub type ListPaginatorBuilder<LI, LO> = Arc<dyn Fn(LI) -> BoxPaginator<LO> + Send + Sync>;

/// One list page to the get inputs it names
pub type ListOutputMapper<LI, LO, GI> = Arc<dyn Fn(LO, &LI) -> Result<Vec<GI>, QueryError> + Send + Sync>;

/// `(scope, query)` to a get input
pub type GetInputMapper<GI> = Arc<dyn Fn(&str, &str) -> GI + Send + Sync>;

/// `(scope, search term)` to some input
pub type SearchMapper<T> = Arc<dyn Fn(&str, &str) -> Result<T, QueryError> + Send + Sync>;

/// Adapter that resolves every listed identifier with a separate get.
pub struct AlwaysGetAdapter<LI, LO, GI> {
    core: AdapterCore,
    list_input: Option<LI>,
    paginator_builder: Option<ListPaginatorBuilder<LI, LO>>,
    list_output_mapper: Option<ListOutputMapper<LI, LO, GI>>,
    get: Option<ItemGetFn<GI>>,
    get_input_mapper: Option<GetInputMapper<GI>>,
    search_input_mapper: Option<SearchMapper<LI>>,
    search_get_input_mapper: Option<SearchMapper<GI>>,
    always_search_identifiers: bool,
    disable_list: bool,
}

impl<LI, LO, GI> AlwaysGetAdapter<LI, LO, GI>
where
    LI: Clone + Send + Sync + 'static,
    LO: Send + 'static,
    GI: Debug + Send + 'static,
{
    pub fn new(item_type: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            core: AdapterCore::new(item_type.into(), scope.into()),
            list_input: None,
            paginator_builder: None,
            list_output_mapper: None,
            get: None,
            get_input_mapper: None,
            search_input_mapper: None,
            search_get_input_mapper: None,
            always_search_identifiers: false,
            disable_list: false,
        }
    }

    /// Input for the unfiltered list call
    pub fn with_list_input(mut self, input: LI) -> Self {
        self.list_input = Some(input);
        self
    }

    pub fn with_paginator_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(LI) -> BoxPaginator<LO> + Send + Sync + 'static,
    {
        self.paginator_builder = Some(Arc::new(builder));
        self
    }

    pub fn with_list_output_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(LO, &LI) -> Result<Vec<GI>, QueryError> + Send + Sync + 'static,
    {
        self.list_output_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn with_get<F, Fut>(mut self, get: F) -> Self
    where
        F: Fn(String, GI) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Item, QueryError>> + Send + 'static,
    {
        self.get = Some(Arc::new(move |scope, input| get(scope, input).boxed()));
        self
    }

    pub fn with_get_input_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str, &str) -> GI + Send + Sync + 'static,
    {
        self.get_input_mapper = Some(Arc::new(mapper));
        self
    }

    /// Search by turning the term into a list input.
    pub fn with_search_input_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str, &str) -> Result<LI, QueryError> + Send + Sync + 'static,
    {
        self.search_input_mapper = Some(Arc::new(mapper));
        self
    }

    /// Search by turning the term into a single get input.
    pub fn with_search_get_input_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str, &str) -> Result<GI, QueryError> + Send + Sync + 'static,
    {
        self.search_get_input_mapper = Some(Arc::new(mapper));
        self
    }

    /// Try identifier search before any custom search mapper whenever the
    /// term parses as an identifier.
    pub fn always_search_identifiers(mut self, enabled: bool) -> Self {
        self.always_search_identifiers = enabled;
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
        let missing = if self.list_input.is_none() {
            Some("list input")
        } else if self.paginator_builder.is_none() {
            Some("paginator builder")
        } else if self.list_output_mapper.is_none() {
            Some("list output mapper")
        } else if self.get.is_none() {
            Some("get function")
        } else if self.get_input_mapper.is_none() {
            Some("get input mapper")
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

    fn get_fn(&self) -> Result<&ItemGetFn<GI>, QueryError> {
        self.get
            .as_ref()
            .ok_or_else(|| QueryError::other("get function is not configured"))
    }

    async fn fetch_one(&self, scope: &str, input: GI, cancel: &CancellationToken) -> Result<Item, QueryError> {
        let get = self.get_fn()?;
        tracing::debug!(adapter = %self.core.name, scope, input = ?input, "get");
        let item = self.core.upstream(cancel, get(scope.to_string(), input)).await?;
        self.core.check_item(item, scope)
    }

    /// Page through the list call for `input` and resolve every descriptor.
    async fn fetch_listed(&self, scope: &str, input: LI, cancel: &CancellationToken) -> Result<Vec<Item>, QueryError> {
        let (Some(builder), Some(output_mapper)) = (&self.paginator_builder, &self.list_output_mapper) else {
            return Err(QueryError::other("list collaborators are not configured"));
        };
        let limiter = self.core.settings.rate_limiter.clone();
        let mut pages = ThrottledPaginator::new(builder(input.clone()), limiter.clone());

        let get = Arc::clone(self.get_fn()?);
        let worker_scope = scope.to_string();
        let worker_cancel = cancel.clone();
        let resolve: GetFn<GI> = get_fn(move |descriptor: GI| {
            let call = get(worker_scope.clone(), descriptor);
            let limiter = limiter.clone();
            let cancel = worker_cancel.clone();
            async move {
                let item = throttled(limiter.as_ref(), &cancel, call).await?;
                item.validate()
                    .map_err(|err| QueryError::other(err.to_string()))?;
                Ok(item)
            }
        });

        tracing::debug!(adapter = %self.core.name, scope, "list");
        FetchPipeline::new(self.core.settings.max_parallel)
            .run(&mut pages, |page| output_mapper(page, &input), resolve, scope, cancel)
            .await
    }

    async fn fetch_search(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError> {
        if self.always_search_identifiers && parse_identifier(query).is_ok() {
            return self.search_identifier(scope, query, ignore_cache, cancel).await;
        }

        if let Some(mapper) = &self.search_input_mapper {
            let input = mapper(scope, query)?;
            return self.fetch_listed(scope, input, cancel).await;
        }

        if let Some(mapper) = &self.search_get_input_mapper {
            let input = mapper(scope, query)?;
            return Ok(vec![self.fetch_one(scope, input, cancel).await?]);
        }

        self.search_identifier(scope, query, ignore_cache, cancel).await
    }

    async fn search_identifier(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError> {
        let identifier = self.core.identifier_in_scope(scope, query)?;
        let item = self
            .get(scope, identifier.resource_id(), ignore_cache, cancel)
            .await?;
        Ok(vec![item])
    }
}

#[async_trait]
impl<LI, LO, GI> Adapter for AlwaysGetAdapter<LI, LO, GI>
where
    LI: Clone + Send + Sync + 'static,
    LO: Send + 'static,
    GI: Debug + Send + 'static,
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

        let Some(mapper) = &self.get_input_mapper else {
            return Err(self.core.fail(QueryError::other("get input mapper is not configured"), scope));
        };

        match self.fetch_one(scope, mapper(scope, query), cancel).await {
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

        let Some(input) = self.list_input.clone() else {
            return Err(self.core.fail(QueryError::other("list input is not configured"), scope));
        };

        match self.fetch_listed(scope, input, cancel).await {
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
