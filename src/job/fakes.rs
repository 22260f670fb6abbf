// Test doubles for the job's three seams.

use crate::checker::{FetchedPage, PageFetcher, Prober};
use crate::error::{FetchError, StoreError};
use crate::model::{LinkResult, LinkResultId, Page, PageId, ProbeOutcome};
use crate::store::{LinkStore, MemoryStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Serves a fixed page, optionally failing the first few fetches
#[derive(Clone)]
pub(crate) struct FakeFetcher {
    response: Result<FetchedPage, FetchError>,
    failures_left: Arc<AtomicUsize>,
    failure: FetchError,
    panic_on: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub(crate) fn html(body: &str) -> Self {
        Self {
            response: Ok(FetchedPage {
                status: 200,
                body: body.as_bytes().to_vec(),
                charset: None,
            }),
            failures_left: Arc::new(AtomicUsize::new(0)),
            failure: FetchError::Status(500),
            panic_on: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing(error: FetchError) -> Self {
        Self {
            response: Err(error.clone()),
            failure: error,
            ..Self::html("")
        }
    }

    // Fails `times` fetches with `error`, then serves `body`
    pub(crate) fn flaky(times: usize, error: FetchError, body: &str) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(times)),
            failure: error,
            ..Self::html(body)
        }
    }

    // Fetching this URL panics instead of answering
    pub(crate) fn panic_on(mut self, url: &str) -> Self {
        self.panic_on = Some(url.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_page(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(url) {
            panic!("fake fetcher told to panic on {}", url);
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(self.failure.clone());
        }
        self.response.clone()
    }
}

// Answers 200 unless told otherwise, and tracks how many probes overlap
#[derive(Default)]
pub(crate) struct FakeProber {
    outcomes: HashMap<String, ProbeOutcome>,
    fast: HashSet<String>,
    delay: Option<Duration>,
    pub(crate) calls: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) peak: AtomicUsize,
}

impl FakeProber {
    pub(crate) fn with(mut self, url: &str, outcome: ProbeOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    // Exempts one URL from the delay
    pub(crate) fn with_fast(mut self, url: &str) -> Self {
        self.fast.insert(url.to_string());
        self
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            if !self.fast.contains(url) {
                tokio::time::sleep(delay).await;
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcomes
            .get(url)
            .copied()
            .unwrap_or(ProbeOutcome::http(200))
    }
}

// Wraps a MemoryStore and injects write failures
pub(crate) struct FlakyStore {
    inner: Arc<MemoryStore>,
    rejected: HashSet<String>,
    fail_first: AtomicUsize,
    unavailable_after: Option<usize>,
    writes: AtomicUsize,
    attempts: Mutex<HashMap<String, usize>>,
}

impl FlakyStore {
    pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            rejected: HashSet::new(),
            fail_first: AtomicUsize::new(0),
            unavailable_after: None,
            writes: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    // Every write for this URL fails
    pub(crate) fn reject_url(mut self, url: &str) -> Self {
        self.rejected.insert(url.to_string());
        self
    }

    // The first `n` writes fail, whatever their URL
    pub(crate) fn fail_first_writes(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    // After `n` successful writes the store reports itself unreachable
    pub(crate) fn unavailable_after(mut self, n: usize) -> Self {
        self.unavailable_after = Some(n);
        self
    }

    pub(crate) fn attempts_for(&self, url: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl LinkStore for FlakyStore {
    async fn create_page(&self, url: &str) -> Result<PageId, StoreError> {
        self.inner.create_page(url).await
    }

    async fn find_page(&self, id: PageId) -> Result<Page, StoreError> {
        self.inner.find_page(id).await
    }

    async fn create_link_result(
        &self,
        page_id: PageId,
        url: &str,
        status: ProbeOutcome,
    ) -> Result<LinkResultId, StoreError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        if let Some(limit) = self.unavailable_after {
            if self.writes.load(Ordering::SeqCst) >= limit {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
        }
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Write("deadlock detected".to_string()));
        }
        if self.rejected.contains(url) {
            return Err(StoreError::Write("constraint violation".to_string()));
        }

        let id = self.inner.create_link_result(page_id, url, status).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn link_results(&self, page_id: PageId) -> Result<Vec<LinkResult>, StoreError> {
        self.inner.link_results(page_id).await
    }
}
