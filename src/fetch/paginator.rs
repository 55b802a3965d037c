//! Paginated list streams
//!
//! A [`Paginator`] yields pages of a provider list call, in order. The
//! engine only ever asks whether more pages exist and for the next one.

use crate::cancel::CancellationToken;
use crate::error::QueryError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

/// A sequential stream of pages
#[async_trait]
pub trait Paginator: Send {
    type Page: Send + 'static;

    fn has_more_pages(&self) -> bool;

    /// Fetch the next page. Calling this when `has_more_pages()` is false
    /// is an error.
    async fn next_page(&mut self, cancel: &CancellationToken) -> Result<Self::Page, QueryError>;
}

/// Boxed paginator over pages of type `P`
pub type BoxPaginator<P> = Box<dyn Paginator<Page = P>>;

/// Fetch one page given the continuation token from the previous page.
///
/// Returns the page and the next token; `None` or an empty token ends the
/// stream.
pub type PageFetchFn<P> =
    Arc<dyn Fn(Option<String>) -> BoxFuture<'static, Result<(P, Option<String>), QueryError>> + Send + Sync>;

/// Drives any next-token style list API.
pub struct TokenPaginator<P> {
    fetch: PageFetchFn<P>,
    next_token: Option<String>,
    started: bool,
}

impl<P: Send + 'static> TokenPaginator<P> {
    pub fn new(fetch: PageFetchFn<P>) -> Self {
        Self {
            fetch,
            next_token: None,
            started: false,
        }
    }

    /// Build from a plain async closure.
    pub fn from_fn<F, Fut>(fetch: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(P, Option<String>), QueryError>> + Send + 'static,
    {
        Self::new(Arc::new(move |token| fetch(token).boxed()))
    }
}

#[async_trait]
impl<P: Send + 'static> Paginator for TokenPaginator<P> {
    type Page = P;

    fn has_more_pages(&self) -> bool {
        !self.started || self.next_token.is_some()
    }

    async fn next_page(&mut self, cancel: &CancellationToken) -> Result<P, QueryError> {
        if !self.has_more_pages() {
            return Err(QueryError::other("no more pages"));
        }

        let request = (self.fetch)(self.next_token.take());
        let (page, token) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(QueryError::cancelled()),
            result = request => result?,
        };

        self.started = true;
        self.next_token = token.filter(|t| !t.is_empty());
        Ok(page)
    }
}

/// Pages already held in memory. Also serves non-paginated APIs as a
/// single page.
pub struct StaticPaginator<P> {
    pages: VecDeque<P>,
}

impl<P> StaticPaginator<P> {
    pub fn new(pages: Vec<P>) -> Self {
        Self {
            pages: pages.into(),
        }
    }

    pub fn single(page: P) -> Self {
        Self::new(vec![page])
    }
}

#[async_trait]
impl<P: Send + 'static> Paginator for StaticPaginator<P> {
    type Page = P;

    fn has_more_pages(&self) -> bool {
        !self.pages.is_empty()
    }

    async fn next_page(&mut self, cancel: &CancellationToken) -> Result<P, QueryError> {
        if cancel.is_cancelled() {
            return Err(QueryError::cancelled());
        }
        self.pages
            .pop_front()
            .ok_or_else(|| QueryError::other("no more pages"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Page = Result<(Vec<u32>, Option<String>), QueryError>;

    fn page(items: Vec<u32>, next: &str) -> Page {
        Ok((items, Some(next.to_string())))
    }

    fn three_pages() -> TokenPaginator<Vec<u32>> {
        TokenPaginator::from_fn(|token: Option<String>| async move {
            match token.as_deref() {
                None => page(vec![1, 2], "p2"),
                Some("p2") => page(vec![3], "p3"),
                Some("p3") => page(vec![4, 5], ""),
                Some(other) => Err(QueryError::other(format!("bad token {}", other))),
            }
        })
    }

    #[tokio::test]
    async fn token_paginator_follows_tokens_until_empty() {
        let cancel = CancellationToken::new();
        let mut paginator = three_pages();
        let mut seen = Vec::new();
        while paginator.has_more_pages() {
            seen.extend(paginator.next_page(&cancel).await.unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert!(paginator.next_page(&cancel).await.is_err());
    }

    #[tokio::test]
    async fn token_paginator_propagates_errors() {
        let cancel = CancellationToken::new();
        let mut paginator = TokenPaginator::from_fn(|_token: Option<String>| async {
            Page::Err(QueryError::upstream("throttled"))
        });
        let err = paginator.next_page(&cancel).await.unwrap_err();
        assert_eq!(err.message, "throttled");
    }

    #[tokio::test]
    async fn cancelled_token_stops_paging() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut paginator = three_pages();
        assert!(paginator.next_page(&cancel).await.is_err());

        let mut fixed = StaticPaginator::single(vec![1u32]);
        assert!(fixed.next_page(&cancel).await.is_err());
    }

    #[tokio::test]
    async fn static_paginator_yields_in_order() {
        let cancel = CancellationToken::new();
        let mut paginator: BoxPaginator<&str> = Box::new(StaticPaginator::new(vec!["a", "b"]));
        assert_eq!(paginator.next_page(&cancel).await.unwrap(), "a");
        assert_eq!(paginator.next_page(&cancel).await.unwrap(), "b");
        assert!(!paginator.has_more_pages());
    }
}
