//! In-memory provider used by the integration tests
//!
//! Counts every upstream call and stamps each fetched resource with a
//! monotonic marker, so tests can tell a cached answer from a fresh one.

use overlook::QueryError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Names returned per list page
pub const PAGE_SIZE: usize = 2;

/// A resource as the provider returns it
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    /// Value of the provider's marker counter when this copy was fetched
    pub marker: u64,
}

#[derive(Default)]
pub struct MockCloud {
    names: Vec<String>,
    failing: HashSet<String>,
    get_delay: Duration,
    gets: AtomicUsize,
    lists: AtomicUsize,
    marker: AtomicU64,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockCloud {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Gets for `name` fail with a passthrough provider error.
    pub fn with_failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    /// Upstream get and describe calls so far
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Upstream list page calls so far
    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn upstream_calls(&self) -> usize {
        self.gets() + self.lists()
    }

    /// Most gets ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn stamp(&self, name: &str) -> Resource {
        Resource {
            name: name.to_string(),
            marker: self.marker.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    pub async fn get(&self, name: &str) -> Result<Resource, QueryError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(name) {
            return Err(QueryError::upstream(format!("AccessDenied: {}", name)));
        }
        if !self.names.iter().any(|n| n == name) {
            return Err(QueryError::not_found(format!("{} does not exist", name)));
        }
        Ok(self.stamp(name))
    }

    /// One page of names. The token is the index of the first name.
    pub async fn list_page(&self, token: Option<String>) -> Result<(Vec<String>, Option<String>), QueryError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let start: usize = match token {
            Some(t) => t
                .parse()
                .map_err(|_| QueryError::other(format!("bad page token {}", t)))?,
            None => 0,
        };
        let end = (start + PAGE_SIZE).min(self.names.len());
        let page = self.names[start.min(end)..end].to_vec();
        let next = (end < self.names.len()).then(|| end.to_string());
        Ok((page, next))
    }

    /// Full resources, optionally filtered to names starting with `prefix`.
    pub async fn describe(&self, prefix: Option<&str>) -> Result<Vec<Resource>, QueryError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .names
            .iter()
            .filter(|n| prefix.map_or(true, |p| n.starts_with(p)))
            .map(|n| self.stamp(n))
            .collect())
    }

    /// Every resource in one call
    pub async fn list_all(&self) -> Result<Vec<Resource>, QueryError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.names.iter().map(|n| self.stamp(n)).collect())
    }
}
