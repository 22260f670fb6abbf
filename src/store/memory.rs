// src/store/memory.rs
// =============================================================================
// In-memory LinkStore backed by DashMap.
//
// Results are keyed by their own id. A page does not hold a list of its
// results; `link_results` finds them by scanning for the page id, the same
// way a query against a link table would.
// =============================================================================

use super::LinkStore;
use crate::error::StoreError;
use crate::model::{LinkResult, LinkResultId, Page, PageId, ProbeOutcome};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: DashMap<PageId, Page>,
    // (insertion sequence, result)
    links: DashMap<LinkResultId, (u64, LinkResult)>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn create_page(&self, url: &str) -> Result<PageId, StoreError> {
        let id = PageId::new();
        self.pages.insert(
            id,
            Page {
                id,
                url: url.to_string(),
            },
        );
        Ok(id)
    }

    async fn find_page(&self, id: PageId) -> Result<Page, StoreError> {
        self.pages
            .get(&id)
            .map(|page| page.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn create_link_result(
        &self,
        page_id: PageId,
        url: &str,
        status: ProbeOutcome,
    ) -> Result<LinkResultId, StoreError> {
        let id = LinkResultId::new();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let result = LinkResult {
            id,
            page_id,
            url: url.to_string(),
            status,
            checked_at: Utc::now(),
        };
        self.links.insert(id, (seq, result));
        Ok(id)
    }

    async fn link_results(&self, page_id: PageId) -> Result<Vec<LinkResult>, StoreError> {
        let mut found: Vec<(u64, LinkResult)> = self
            .links
            .iter()
            .filter(|entry| entry.value().1.page_id == page_id)
            .map(|entry| entry.value().clone())
            .collect();

        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, result)| result).collect())
    }
}
