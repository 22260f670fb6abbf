// src/store/mod.rs
// =============================================================================
// The persistence boundary.
//
// Jobs only need three calls: look a page up, write one link result, and
// (for the caller who submitted the page) create the page and read results
// back. Anything that can do that is a `LinkStore`.
//
// Submodules:
// - memory: a concurrent in-process store used by the CLI and the tests
// =============================================================================

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::model::{LinkResult, LinkResultId, Page, PageId, ProbeOutcome};
use async_trait::async_trait;

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Stores a new page. The URL is assumed to be validated already.
    async fn create_page(&self, url: &str) -> Result<PageId, StoreError>;

    /// Looks a page up by id, failing with `StoreError::NotFound`
    async fn find_page(&self, id: PageId) -> Result<Page, StoreError>;

    /// Inserts one independent link record
    async fn create_link_result(
        &self,
        page_id: PageId,
        url: &str,
        status: ProbeOutcome,
    ) -> Result<LinkResultId, StoreError>;

    /// Every result recorded for a page, oldest first
    async fn link_results(&self, page_id: PageId) -> Result<Vec<LinkResult>, StoreError>;
}
