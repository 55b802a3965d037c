//! Query error taxonomy
//!
//! Every adapter call returns either a result set or exactly one
//! [`QueryError`]. The [`ErrorKind`] is what consumers branch on: retry,
//! escalate, or silently skip.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed upstream error as supplied by collaborator functions.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The requested scope is not one this adapter answers for
    NoScope,
    /// The resource does not exist
    NotFound,
    /// Ambiguous or unexpected outcome, validation failure, cancellation
    Other,
    /// Provider error passed through without reclassification
    Upstream,
}

impl ErrorKind {
    /// Structurally permanent outcomes that may be negative-cached.
    pub fn is_cacheable(self) -> bool {
        matches!(self, ErrorKind::NotFound | ErrorKind::NoScope)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NoScope => "NOSCOPE",
            ErrorKind::NotFound => "NOTFOUND",
            ErrorKind::Other => "OTHER",
            ErrorKind::Upstream => "UPSTREAM",
        };
        f.write_str(s)
    }
}

/// The single error type returned by adapter Get/List/Search.
///
/// Cheap to clone so a cached error can be replayed to many callers;
/// the upstream source is shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct QueryError {
    pub kind: ErrorKind,
    pub message: String,
    /// Scope the failing query was issued against
    pub scope: String,
    /// Name of the adapter that produced the error
    pub source_name: String,
    /// Item type the failing query asked for
    pub item_type: String,
    #[source]
    upstream: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl QueryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            scope: String::new(),
            source_name: String::new(),
            item_type: String::new(),
            upstream: None,
        }
    }

    pub fn no_scope(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoScope, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Wrap a provider error. The message is taken from the source.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        let err: BoxError = err.into();
        let mut query_err = Self::new(ErrorKind::Upstream, err.to_string());
        query_err.upstream = Some(Arc::from(err));
        query_err
    }

    pub fn cancelled() -> Self {
        Self::other("operation cancelled")
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    /// Fill in adapter context without overwriting anything a collaborator
    /// already set.
    pub fn in_context(mut self, source_name: &str, scope: &str, item_type: &str) -> Self {
        if self.source_name.is_empty() {
            self.source_name = source_name.to_string();
        }
        if self.scope.is_empty() {
            self.scope = scope.to_string();
        }
        if self.item_type.is_empty() {
            self.item_type = item_type.to_string();
        }
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_no_scope(&self) -> bool {
        self.kind == ErrorKind::NoScope
    }
}

/// Result type for adapter operations
pub type QueryResult<T> = Result<T, QueryError>;
