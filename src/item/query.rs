//! Query coordinates and linked-item pointers

use serde::{Deserialize, Serialize};

/// Which of the three adapter methods a query addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryMethod {
    Get,
    List,
    Search,
}

impl std::fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryMethod::Get => "GET",
            QueryMethod::List => "LIST",
            QueryMethod::Search => "SEARCH",
        };
        f.write_str(s)
    }
}

/// Coordinates of a Get/List/Search call against some adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    #[serde(rename = "type")]
    pub item_type: String,
    pub method: QueryMethod,
    /// Empty for LIST
    #[serde(default)]
    pub query: String,
    pub scope: String,
}

impl Query {
    pub fn new(
        item_type: impl Into<String>,
        method: QueryMethod,
        query: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            method,
            query: query.into(),
            scope: scope.into(),
        }
    }

    pub fn get(item_type: impl Into<String>, query: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(item_type, QueryMethod::Get, query, scope)
    }

    pub fn list(item_type: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(item_type, QueryMethod::List, "", scope)
    }

    pub fn search(item_type: impl Into<String>, query: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(item_type, QueryMethod::Search, query, scope)
    }
}

/// Whether a change propagates across a link.
///
/// `inbound`: a change to the linked item can affect this item.
/// `outbound`: a change to this item can affect the linked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlastPropagation {
    #[serde(rename = "in")]
    pub inbound: bool,
    #[serde(rename = "out")]
    pub outbound: bool,
}

impl BlastPropagation {
    pub fn new(inbound: bool, outbound: bool) -> Self {
        Self { inbound, outbound }
    }

    /// Tightly coupled: changes flow both ways
    pub fn both() -> Self {
        Self::new(true, true)
    }

    pub fn none() -> Self {
        Self::new(false, false)
    }
}

/// Declarative pointer from one item to another item's query coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkedItemQuery {
    pub query: Query,
    pub blast_propagation: BlastPropagation,
}

impl LinkedItemQuery {
    pub fn new(query: Query, blast_propagation: BlastPropagation) -> Self {
        Self {
            query,
            blast_propagation,
        }
    }
}
