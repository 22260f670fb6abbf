// src/error.rs
// =============================================================================
// Failure taxonomy for the library.
//
// Only three things can fail a job: an unknown job key, the page's own
// fetch, and a store that cannot take writes. Everything that goes wrong
// with an individual link is recorded as a ProbeOutcome instead.
// =============================================================================

use crate::model::{NetworkErrorKind, PageId};
use thiserror::Error;

/// Errors raised by a `LinkStore`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("page {0} not found")]
    NotFound(PageId),

    /// The store cannot be reached at all
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A single write was refused
    #[error("write failed: {0}")]
    Write(String),
}

/// Why the page's own HTML could not be fetched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Network(NetworkErrorKind),

    #[error("HTTP {0}")]
    Status(u16),
}

#[derive(Error, Debug)]
pub enum JobError {
    /// The job key never named a page. Retrying cannot help.
    #[error("invalid job key: page {0} does not exist")]
    InvalidJobKey(PageId),

    /// Transient; the queue should deliver the job again
    #[error("could not fetch {url}: {source}")]
    SourceFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("persistence unavailable for page {page_id} after {persisted} record(s): {reason}")]
    PersistenceUnavailable {
        page_id: PageId,
        persisted: usize,
        reason: String,
    },

    /// The job task died (panicked or was cancelled) before returning
    #[error("job for page {page_id} aborted: {reason}")]
    Aborted { page_id: PageId, reason: String },
}

impl JobError {
    /// Whether redelivering the same job key may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::SourceFetch { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
}

/// Errors from submitting a new page for checking
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("invalid page URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
