//! Cache keys

use crate::item::QueryMethod;
use std::fmt;

/// Uniquely addresses one cached result set or error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub adapter_name: String,
    pub method: QueryMethod,
    pub scope: String,
    pub item_type: String,
    /// Empty for LIST
    pub query: String,
}

impl CacheKey {
    pub fn new(
        adapter_name: impl Into<String>,
        method: QueryMethod,
        scope: impl Into<String>,
        item_type: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            method,
            scope: scope.into(),
            item_type: item_type.into(),
            query: query.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.adapter_name, self.method, self.scope, self.item_type, self.query
        )
    }
}
