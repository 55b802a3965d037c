//! Overlook: uniform Get/List/Search adapters for resource-oriented cloud APIs
//!
//! Each adapter answers queries for one resource type in one scope and
//! turns provider responses into [`Item`]s that a graph engine can link
//! together.
//!
//! # Core Concepts
//!
//! - **Adapters**: describe-only, always-get and get-list archetypes, all
//!   exposed through the [`Adapter`] trait
//! - **Scopes**: `{account}.{region}`, `{account}` or `global`
//! - **Result cache**: per-adapter TTL cache with negative caching of
//!   `NOTFOUND` and `NOSCOPE`
//! - **Fetch pipeline**: bounded parallel list-then-get fan-out
//! - **Rate limiter**: token bucket shared by every call to one provider
//!
//! # Example
//!
//! ```
//! use overlook::parse_identifier;
//!
//! let id = parse_identifier("arn:aws:ecs:eu-west-1:052392120703:task-definition/app:1").unwrap();
//! assert_eq!(id.scope(), "052392120703.eu-west-1");
//! assert_eq!(id.resource_id(), "app:1");
//! ```

pub mod adapter;
pub mod cache;
mod cancel;
pub mod config;
mod error;
pub mod fetch;
pub mod identity;
pub mod item;
pub mod rate_limit;

pub use adapter::{
    Adapter, AdapterCategory, AdapterMetadata, AdapterRegistry, AdapterSettings, AlwaysGetAdapter,
    DescribeOnlyAdapter, GetListAdapter, RegistryError,
};
pub use cache::{LazyCache, ResultCache};
pub use cancel::CancellationToken;
pub use config::{ConfigError, EngineConfig};
pub use error::{BoxError, ErrorKind, QueryError, QueryResult};
pub use fetch::{FetchPipeline, Paginator, StaticPaginator, TokenPaginator};
pub use identity::{format_scope, parse_identifier, parse_scope, Identifier, IdentifierError, GLOBAL_SCOPE};
pub use item::{Attributes, Health, Item, LinkedItemQuery, Query, QueryMethod};
pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimiter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
