//! The adapter contract
//!
//! An adapter answers Get/List/Search for exactly one item type in exactly
//! one scope. The external graph engine only ever talks to this trait.

use crate::cancel::CancellationToken;
use crate::error::QueryResult;
use crate::item::Item;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default tie-breaking weight for adapters answering the same Get
pub const DEFAULT_WEIGHT: i32 = 100;

/// Broad grouping of a resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterCategory {
    Compute,
    Storage,
    Network,
    Security,
    Database,
    Observability,
    Configuration,
    #[default]
    Other,
}

/// Descriptive metadata for one adapter type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterMetadata {
    pub item_type: String,
    pub descriptive_name: String,
    #[serde(default)]
    pub category: AdapterCategory,
    /// Human description of what a Get query expects, if Get is supported
    #[serde(default)]
    pub get_description: Option<String>,
    #[serde(default)]
    pub list_description: Option<String>,
    #[serde(default)]
    pub search_description: Option<String>,
    /// Item types this adapter may link to
    #[serde(default)]
    pub potential_links: Vec<String>,
}

impl AdapterMetadata {
    pub fn new(item_type: impl Into<String>, descriptive_name: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            descriptive_name: descriptive_name.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: AdapterCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_get(mut self, description: impl Into<String>) -> Self {
        self.get_description = Some(description.into());
        self
    }

    pub fn with_list(mut self, description: impl Into<String>) -> Self {
        self.list_description = Some(description.into());
        self
    }

    pub fn with_search(mut self, description: impl Into<String>) -> Self {
        self.search_description = Some(description.into());
        self
    }

    pub fn with_potential_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.potential_links = links.into_iter().map(Into::into).collect();
        self
    }
}

/// The contract adapters implement.
///
/// Every method first checks that `scope` is the adapter's single scope
/// and fails with `NOSCOPE` otherwise, before touching the cache or the
/// upstream API.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The item type this adapter produces
    fn item_type(&self) -> &str;

    /// Unique adapter name, `{type}-adapter`
    fn name(&self) -> &str;

    /// Always exactly one scope
    fn scopes(&self) -> Vec<String>;

    /// Priority used to break ties when two adapters answer the same Get
    fn weight(&self) -> i32;

    fn metadata(&self) -> &AdapterMetadata;

    /// Fetch a single item by its unique attribute value.
    async fn get(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Item>;

    /// Enumerate every item in the scope. Order is not stable.
    async fn list(
        &self,
        scope: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Item>>;

    /// Find items matching an adapter-specific query, by default a
    /// fully-qualified identifier.
    async fn search(
        &self,
        scope: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Vec<Item>>;
}
