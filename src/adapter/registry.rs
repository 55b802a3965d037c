//! Adapter registry: routes queries to the adapter that answers them
//!
//! Built once at startup, then shared read-only. Several adapters may
//! answer the same type and scope; Get goes to the highest weight.

use super::traits::{Adapter, AdapterMetadata};
use crate::cancel::CancellationToken;
use crate::error::{QueryError, QueryResult};
use crate::item::Item;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("adapter {name} answering scope {scope} is already registered")]
    Duplicate { name: String, scope: String },
}

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
    keys: HashSet<(String, String)>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Adapter names are per type, so the same name in
    /// another scope is a different adapter; the same name and scope twice
    /// is rejected.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        let name = adapter.name().to_string();
        for scope in adapter.scopes() {
            if self.keys.contains(&(name.clone(), scope.clone())) {
                return Err(RegistryError::Duplicate { name, scope });
            }
        }
        for scope in adapter.scopes() {
            self.keys.insert((name.clone(), scope));
        }
        tracing::debug!(adapter = %name, "registered adapter");
        self.adapters.push(adapter);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Result<Self, RegistryError> {
        self.register(adapter)?;
        Ok(self)
    }

    pub fn adapters(&self) -> &[Arc<dyn Adapter>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Every adapter producing `item_type`, in any scope
    pub fn for_type(&self, item_type: &str) -> Vec<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .filter(|a| a.item_type() == item_type)
            .cloned()
            .collect()
    }

    /// Adapters answering `item_type` in `scope`, highest weight first
    pub fn for_scope(&self, item_type: &str, scope: &str) -> Vec<Arc<dyn Adapter>> {
        let mut matching: Vec<Arc<dyn Adapter>> = self
            .adapters
            .iter()
            .filter(|a| a.item_type() == item_type && a.scopes().iter().any(|s| s == scope))
            .cloned()
            .collect();
        matching.sort_by_key(|a| std::cmp::Reverse(a.weight()));
        matching
    }

    /// Metadata for each distinct item type, first registration wins
    pub fn metadata(&self) -> Vec<AdapterMetadata> {
        let mut seen = HashSet::new();
        self.adapters
            .iter()
            .filter(|a| seen.insert(a.item_type().to_string()))
            .map(|a| a.metadata().clone())
            .collect()
    }

    /// Route a Get to the highest-weight adapter for `item_type` in `scope`.
    pub async fn get(
        &self,
        scope: &str,
        item_type: &str,
        query: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> QueryResult<Item> {
        let Some(adapter) = self.for_scope(item_type, scope).into_iter().next() else {
            return Err(QueryError::no_scope(format!(
                "no adapter answers {} in scope {}",
                item_type, scope
            ))
            .with_scope(scope)
            .with_item_type(item_type));
        };
        adapter.get(scope, query, ignore_cache, cancel).await
    }
}
