// src/lib.rs
// =============================================================================
// link-warden: checks every link on a web page in a background job.
//
// Flow for one page:
//   submit(url) -> store page -> enqueue(page id)
//   worker: load page -> fetch HTML -> extract hrefs -> normalize
//           -> probe (bounded pool) -> write one LinkResult per probe
//
// Modules:
// - model: Page, LinkResult, ProbeOutcome and their ids
// - checker: href extraction, normalization, HTTP fetch/probe
// - store: the persistence boundary and an in-memory store
// - job: the per-page state machine and the job queue
// - service: page submission and result lookup
// - config: settings file + defaults
// - error: failure taxonomy
// =============================================================================

pub mod checker;
pub mod config;
pub mod error;
pub mod job;
pub mod model;
pub mod service;
pub mod store;

pub use config::Settings;
pub use error::{JobError, StoreError, SubmitError};
pub use job::queue::{run_workers, JobQueue};
pub use job::{JobReport, LinkCheckJob};
pub use model::{LinkResult, NetworkErrorKind, Page, PageId, ProbeOutcome};
pub use service::LinkCheckService;
pub use store::{LinkStore, MemoryStore};
