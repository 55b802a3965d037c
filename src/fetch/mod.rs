//! Upstream fetch plumbing: paginators and the parallel get pipeline

mod paginator;
mod pipeline;

pub use paginator::{BoxPaginator, PageFetchFn, Paginator, StaticPaginator, TokenPaginator};
pub use pipeline::{get_fn, FetchPipeline, GetFn, DEFAULT_MAX_PARALLEL};
