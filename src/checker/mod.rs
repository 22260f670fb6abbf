// src/checker/mod.rs
// =============================================================================
// This module contains the per-link building blocks of a check.
//
// Submodules:
// - html: pulls raw hrefs out of an HTML page
// - normalize: turns a raw href into an absolute URL (or rejects it)
// - http: fetches pages and probes links over the network
//
// This file (mod.rs) is the module root - it re-exports the pieces the job
// and the binary use, so callers write `checker::normalize` instead of
// `checker::normalize::normalize`.
// =============================================================================

mod html;
mod http;
mod normalize;

pub use html::{extract_hrefs, LinkExtractor};
pub use http::{FetchedPage, HttpClient, PageFetcher, Prober};
pub use normalize::{normalize, Normalized};
