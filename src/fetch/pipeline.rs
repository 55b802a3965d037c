//! Bounded parallel list-then-get fan-out
//!
//! Used whenever a list call only yields partial identifiers that must be
//! resolved with a separate get. Three stages:
//!
//! 1. Producer (the calling task): walks the paginator in order and maps
//!    each page to descriptors, sent on a bounded channel.
//! 2. Dispatcher: takes descriptors, waits for one of `max_parallel`
//!    semaphore permits, and spawns a worker per descriptor. A worker runs
//!    the get, sends the item to the collector, and releases its permit.
//! 3. Collector: drains results into the output vector until every
//!    sender is gone.
//!
//! A failed or panicking worker only loses its own item. A failing
//! producer aborts the whole call, and so does cancellation: a cancelled
//! run never hands back the items that happened to finish. Dropping the
//! `run` future aborts the dispatcher and collector tasks with it.

use super::paginator::Paginator;
use crate::cancel::CancellationToken;
use crate::error::QueryError;
use crate::item::Item;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Default number of concurrent gets per call
pub const DEFAULT_MAX_PARALLEL: usize = 10;

/// Resolve one descriptor into an item
pub type GetFn<D> = Arc<dyn Fn(D) -> BoxFuture<'static, Result<Item, QueryError>> + Send + Sync>;

/// Box a plain async closure into a [`GetFn`].
pub fn get_fn<D, F, Fut>(f: F) -> GetFn<D>
where
    F: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Item, QueryError>> + Send + 'static,
{
    Arc::new(move |descriptor| f(descriptor).boxed())
}

/// Runs the producer/worker/collector pipeline with a fixed parallelism.
#[derive(Debug, Clone, Copy)]
pub struct FetchPipeline {
    max_parallel: usize,
}

impl Default for FetchPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLEL)
    }
}

impl FetchPipeline {
    /// A parallelism of zero is treated as one.
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Page through `paginator`, map each page to descriptors with
    /// `map_page`, and resolve every descriptor with `get`.
    ///
    /// Items come back in completion order, not list order.
    pub async fn run<P, D, M>(
        &self,
        paginator: &mut P,
        mut map_page: M,
        get: GetFn<D>,
        scope: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, QueryError>
    where
        P: Paginator + ?Sized,
        D: Debug + Send + 'static,
        M: FnMut(P::Page) -> Result<Vec<D>, QueryError>,
    {
        let (descriptor_tx, descriptor_rx) = mpsc::channel::<D>(self.max_parallel);
        let (item_tx, item_rx) = mpsc::channel::<Item>(self.max_parallel);

        let mut collector = AbortOnDrop(tokio::spawn(collect(item_rx)));
        let mut dispatcher = AbortOnDrop(tokio::spawn(dispatch(
            descriptor_rx,
            item_tx,
            get,
            Arc::new(Semaphore::new(self.max_parallel)),
            scope.to_string(),
            cancel.clone(),
        )));

        let produced = async {
            while paginator.has_more_pages() {
                if cancel.is_cancelled() {
                    return Err(QueryError::cancelled());
                }
                let page = paginator.next_page(cancel).await?;
                for descriptor in map_page(page)? {
                    if descriptor_tx.send(descriptor).await.is_err() {
                        return Err(QueryError::other("fetch dispatcher stopped unexpectedly"));
                    }
                }
            }
            Ok::<(), QueryError>(())
        }
        .await;
        drop(descriptor_tx);

        // On every early return the guards abort both tasks, and the
        // dispatcher's JoinSet takes the in-flight workers down with it.
        produced?;

        if let Err(err) = (&mut dispatcher.0).await {
            return Err(QueryError::other(format!("fetch dispatcher failed: {}", err)));
        }

        let items = (&mut collector.0)
            .await
            .map_err(|err| QueryError::other(format!("fetch collector failed: {}", err)))?;

        if cancel.is_cancelled() {
            tracing::debug!(scope = %scope, collected = items.len(), "list fan-out cancelled; partial result discarded");
            return Err(QueryError::cancelled());
        }
        Ok(items)
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn collect(mut rx: mpsc::Receiver<Item>) -> Vec<Item> {
    let mut items = Vec::new();
    while let Some(item) = rx.recv().await {
        items.push(item);
    }
    items
}

async fn dispatch<D>(
    mut descriptors: mpsc::Receiver<D>,
    results: mpsc::Sender<Item>,
    get: GetFn<D>,
    semaphore: Arc<Semaphore>,
    scope: String,
    cancel: CancellationToken,
) where
    D: Debug + Send + 'static,
{
    let mut workers = JoinSet::new();

    while let Some(descriptor) = descriptors.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };

        let get = Arc::clone(&get);
        let results = results.clone();
        let scope = scope.clone();
        let cancel = cancel.clone();

        workers.spawn(async move {
            let _permit = permit;
            let label = format!("{:?}", descriptor);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(QueryError::cancelled()),
                result = get(descriptor) => result,
            };

            match outcome {
                Ok(item) => {
                    // The collector only goes away when the caller aborted.
                    let _ = results.send(item).await;
                }
                Err(err) => {
                    tracing::warn!(
                        descriptor = %label,
                        scope = %scope,
                        error = %err,
                        "get failed during list fan-out; item dropped"
                    );
                }
            }
        });
    }

    // Workers hold their own sender clones; the collector finishes once
    // the last of them completes.
    drop(results);

    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            log_join_error(&err, &scope);
        }
    }
}

fn log_join_error(err: &JoinError, scope: &str) {
    if err.is_panic() {
        tracing::error!(scope = %scope, "get worker panicked during list fan-out; item dropped");
    } else {
        tracing::debug!(scope = %scope, "get worker aborted");
    }
}
