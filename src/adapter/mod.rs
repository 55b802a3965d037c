//! Adapter layer
//!
//! Three archetypes cover the shapes provider APIs come in: a single
//! describe call, list-then-get, and get plus list with full detail. All
//! of them answer through the [`Adapter`] trait and share the same scope
//! check, cache and rate-limit handling.

mod always_get;
mod common;
mod describe;
mod get_list;
mod registry;
mod traits;

pub use always_get::{AlwaysGetAdapter, GetInputMapper, ItemGetFn, ListOutputMapper, ListPaginatorBuilder, SearchMapper};
pub use common::AdapterSettings;
pub use describe::{DescribeFn, DescribeOnlyAdapter, OutputMapper, PaginatorBuilder, QueryInputMapper, ScopeInputMapper};
pub use get_list::{GetListAdapter, ItemMapper, ResourceGetFn, ResourceListFn, ResourceSearchFn, TagsFn};
pub use registry::{AdapterRegistry, RegistryError};
pub use traits::{Adapter, AdapterCategory, AdapterMetadata, DEFAULT_WEIGHT};
