// src/service.rs
// =============================================================================
// The front door: submitting a page for checking and reading results back.
//
// Submitting validates the URL, stores the page, then enqueues only its id.
// The job that eventually runs re-reads the page from the store.
// =============================================================================

use crate::error::{StoreError, SubmitError};
use crate::job::queue::JobQueue;
use crate::model::{validate_page_url, LinkResult, PageId};
use crate::store::LinkStore;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct LinkCheckService {
    store: Arc<dyn LinkStore>,
    queue: Arc<JobQueue>,
}

impl LinkCheckService {
    pub fn new(store: Arc<dyn LinkStore>, queue: Arc<JobQueue>) -> Self {
        Self { store, queue }
    }

    // Creates the page record and queues a check for it
    //
    // Nothing is stored when the URL is invalid.
    pub async fn submit(&self, url: &str) -> Result<PageId, SubmitError> {
        let url = url.trim();
        validate_page_url(url).map_err(SubmitError::InvalidUrl)?;

        let page_id = self.store.create_page(url).await?;
        self.queue.enqueue(page_id)?;

        info!(%page_id, url, "page submitted");
        Ok(page_id)
    }

    pub async fn results(&self, page_id: PageId) -> Result<Vec<LinkResult>, StoreError> {
        self.store.link_results(page_id).await
    }
}
