// src/job/mod.rs
// =============================================================================
// The link check job: everything that happens to one page after it is queued.
//
//   Loading -> Fetching -> Extracting -> Probing -> Persisting -> Done
//                                                           \-> Failed
//
// A job is handed nothing but a PageId. It looks the page up, downloads it,
// pulls out the hrefs, probes every one that normalizes to an http(s) URL
// and writes one LinkResult per probe.
//
// Probing is the only phase that fans out. It runs through a bounded pool
// (buffer_unordered) that belongs to this one job, and the whole phase has
// its own deadline: probes that finished in time are kept, probes that never
// started are dropped, and anything still in flight is discarded.
//
// Submodules:
// - queue: at-least-once delivery of job keys to a pool of workers
// =============================================================================

pub mod queue;

#[cfg(test)]
pub(crate) mod fakes;

use crate::checker::{extract_hrefs, normalize, PageFetcher, Prober};
use crate::config::JobSettings;
use crate::error::{JobError, StoreError};
use crate::model::{PageId, ProbeOutcome};
use crate::store::LinkStore;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Where a job currently is; logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Loading,
    Fetching,
    Extracting,
    Probing,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Loading => "loading",
            JobState::Fetching => "fetching",
            JobState::Extracting => "extracting",
            JobState::Probing => "probing",
            JobState::Persisting => "persisting",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts for one successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub page_id: PageId,
    /// hrefs found on the page, duplicates included
    pub hrefs_found: usize,
    /// hrefs the normalizer dropped
    pub rejected: usize,
    /// probes that finished before the deadline
    pub probed: usize,
    /// accepted links never probed (or cut off) because the deadline passed
    pub abandoned: usize,
    pub persisted: usize,
    pub write_failures: usize,
}

impl JobReport {
    fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            hrefs_found: 0,
            rejected: 0,
            probed: 0,
            abandoned: 0,
            persisted: 0,
            write_failures: 0,
        }
    }
}

pub struct LinkCheckJob {
    store: Arc<dyn LinkStore>,
    fetcher: Arc<dyn PageFetcher>,
    prober: Arc<dyn Prober>,
    settings: JobSettings,
}

impl LinkCheckJob {
    pub fn new(
        store: Arc<dyn LinkStore>,
        fetcher: Arc<dyn PageFetcher>,
        prober: Arc<dyn Prober>,
        settings: JobSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            prober,
            settings,
        }
    }

    // Runs the whole pipeline for one delivered job key
    //
    // Running it again for the same page writes a fresh, independent batch
    // of results. Nothing from an earlier run is reused or removed.
    pub async fn perform(&self, page_id: PageId) -> Result<JobReport, JobError> {
        let span = tracing::info_span!("link_check", %page_id);
        async move {
            let result = self.run(page_id).await;
            match &result {
                Ok(report) => info!(
                    state = %JobState::Done,
                    persisted = report.persisted,
                    rejected = report.rejected,
                    abandoned = report.abandoned,
                    write_failures = report.write_failures,
                    "job finished"
                ),
                Err(e) => warn!(state = %JobState::Failed, transient = e.is_transient(), error = %e, "job failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, page_id: PageId) -> Result<JobReport, JobError> {
        let mut report = JobReport::new(page_id);

        debug!(state = %JobState::Loading);
        let page = match self.store.find_page(page_id).await {
            Ok(page) => page,
            Err(StoreError::NotFound(_)) => return Err(JobError::InvalidJobKey(page_id)),
            Err(e) => {
                return Err(JobError::PersistenceUnavailable {
                    page_id,
                    persisted: 0,
                    reason: e.to_string(),
                })
            }
        };

        debug!(state = %JobState::Fetching, url = %page.url);
        let fetched = self
            .fetcher
            .fetch_page(&page.url, self.settings.fetch_timeout())
            .await
            .map_err(|source| JobError::SourceFetch {
                url: page.url.clone(),
                source,
            })?;

        debug!(state = %JobState::Extracting, status = fetched.status, bytes = fetched.body.len());
        let hrefs = extract_hrefs(&fetched.body, fetched.charset.as_deref());
        report.hrefs_found = hrefs.len();

        let mut accepted = Vec::with_capacity(hrefs.len());
        for href in &hrefs {
            match normalize(href, &page.url).accepted() {
                Some(url) => accepted.push(url),
                None => {
                    debug!(href = %href, "skipping href");
                    report.rejected += 1;
                }
            }
        }

        debug!(state = %JobState::Probing, links = accepted.len());
        let probed = self.probe_all(accepted, &mut report).await;

        debug!(state = %JobState::Persisting, records = probed.len());
        self.persist_all(page_id, probed, &mut report).await?;

        Ok(report)
    }

    // Probes every accepted URL through a pool of at most `concurrency`
    // requests, stopping at the job deadline
    async fn probe_all(
        &self,
        urls: Vec<String>,
        report: &mut JobReport,
    ) -> Vec<(String, ProbeOutcome)> {
        let total = urls.len();
        let timeout = self.settings.probe_timeout();
        // A timeout too large to add to the clock means no deadline at all
        let deadline = Instant::now().checked_add(self.settings.job_timeout());

        let prober = Arc::clone(&self.prober);
        let mut in_flight = stream::iter(urls)
            .map(move |url| {
                let prober = Arc::clone(&prober);
                async move {
                    let outcome = prober.probe(&url, timeout).await;
                    debug!(url = %url, outcome = %outcome, "probed");
                    (url, outcome)
                }
            })
            .buffer_unordered(self.settings.concurrency.max(1));

        let mut completed = Vec::with_capacity(total);
        loop {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, in_flight.next()).await,
                None => Ok(in_flight.next().await),
            };
            match next {
                Ok(Some(result)) => completed.push(result),
                Ok(None) => break,
                Err(_) => {
                    report.abandoned = total - completed.len();
                    warn!(
                        completed = completed.len(),
                        abandoned = report.abandoned,
                        "probing deadline reached"
                    );
                    break;
                }
            }
        }

        report.probed = completed.len();
        completed
    }

    // Writes one record per probe. Each write stands alone: a record that
    // keeps failing is counted and skipped, and nothing already written is
    // undone. Only a store that refuses everything fails the job.
    async fn persist_all(
        &self,
        page_id: PageId,
        probed: Vec<(String, ProbeOutcome)>,
        report: &mut JobReport,
    ) -> Result<(), JobError> {
        let mut last_error = None;

        for (url, outcome) in probed {
            match self.write_with_attempts(page_id, &url, outcome).await {
                Ok(()) => report.persisted += 1,
                Err(StoreError::Unavailable(reason)) => {
                    return Err(JobError::PersistenceUnavailable {
                        page_id,
                        persisted: report.persisted,
                        reason,
                    });
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "giving up on link record");
                    report.write_failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if report.persisted == 0 => Err(JobError::PersistenceUnavailable {
                page_id,
                persisted: 0,
                reason: e.to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn write_with_attempts(
        &self,
        page_id: PageId,
        url: &str,
        outcome: ProbeOutcome,
    ) -> Result<(), StoreError> {
        let attempts = self.settings.write_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.create_link_result(page_id, url, outcome).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < attempts => {
                    debug!(url, attempt, error = %e, "retrying link record");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
