// src/job/queue.rs
// =============================================================================
// An in-memory, at-least-once job queue and the workers that drain it.
//
// How it works:
// 1. `enqueue(page_id)` puts a delivery at the back of the ready list
// 2. Workers call `next()` and get the delivery; it is now "in flight"
// 3. When the job returns, `settle()` either acknowledges the delivery or,
//    for a transient failure, puts it back with the attempt count bumped
// 4. `next()` returns None once nothing is ready and nothing is in flight,
//    which is how workers know the queue has drained
//
// Redelivery is immediate: there is no backoff here. A job key that keeps
// failing transiently is given up on after `max_deliveries` attempts.
//
// Rust concepts:
// - VecDeque: FIFO list of ready deliveries
// - Notify: wakes idle workers when work arrives or the queue drains
// - JoinSet: owns the spawned worker tasks
// - JoinError: a job that panics comes back as an error, not a dead worker
// =============================================================================

use super::{JobReport, LinkCheckJob};
use crate::error::{JobError, QueueError};
use crate::model::PageId;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// One handing-out of a job key to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub page_id: PageId,
    /// 1 for the first delivery, 2 for the first redelivery, ...
    pub attempt: u32,
}

/// What the queue did with a delivery after the job returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Redelivered,
    Discarded,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Delivery>,
    in_flight: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    changed: Notify,
    max_deliveries: u32,
}

impl JobQueue {
    pub fn new(max_deliveries: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Notify::new(),
            max_deliveries: max_deliveries.max(1),
        }
    }

    // No update leaves QueueState half-written, so a poisoned lock is usable.
    // A job that panics never holds this lock: run_workers catches it and
    // settles the delivery as Aborted.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enqueue(&self, page_id: PageId) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.ready.push_back(Delivery { page_id, attempt: 1 });
        drop(state);

        self.changed.notify_waiters();
        Ok(())
    }

    /// Stops accepting new job keys. Deliveries already queued still run.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    pub fn len(&self) -> usize {
        let state = self.lock();
        state.ready.len() + state.in_flight
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Waits for the next delivery
    //
    // Returns None once the queue is drained (nothing ready, nothing in flight)
    pub async fn next(&self) -> Option<Delivery> {
        loop {
            // Register for wakeups before looking, so a notify between the
            // check and the await is not lost
            let notified = self.changed.notified();
            {
                let mut state = self.lock();
                if let Some(delivery) = state.ready.pop_front() {
                    state.in_flight += 1;
                    return Some(delivery);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }
            notified.await;
        }
    }

    // Records how a delivery's job ended
    pub fn settle(&self, delivery: Delivery, result: &Result<JobReport, JobError>) -> Settlement {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        let settlement = match result {
            Ok(_) => Settlement::Acked,
            Err(e) if e.is_transient() && delivery.attempt < self.max_deliveries => {
                state.ready.push_back(Delivery {
                    page_id: delivery.page_id,
                    attempt: delivery.attempt + 1,
                });
                Settlement::Redelivered
            }
            Err(_) => Settlement::Discarded,
        };
        drop(state);

        self.changed.notify_waiters();
        settlement
    }
}

/// The result of one delivery
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub delivery: Delivery,
    pub result: Result<JobReport, JobError>,
    pub settlement: Settlement,
}

// Runs `workers` tasks that pull deliveries until the queue drains
//
// Returns every delivery's outcome, redelivered attempts included,
// grouped by the worker that ran it.
pub async fn run_workers(
    queue: Arc<JobQueue>,
    job: Arc<LinkCheckJob>,
    workers: usize,
) -> Vec<DeliveryOutcome> {
    let mut tasks = JoinSet::new();

    for worker in 0..workers.max(1) {
        let queue = Arc::clone(&queue);
        let job = Arc::clone(&job);
        tasks.spawn(async move {
            let mut outcomes = Vec::new();
            while let Some(delivery) = queue.next().await {
                info!(worker, page_id = %delivery.page_id, attempt = delivery.attempt, "delivering job");
                // Each job runs in its own task so a panic fails only this delivery
                let page_id = delivery.page_id;
                let running = tokio::spawn({
                    let job = Arc::clone(&job);
                    async move { job.perform(page_id).await }
                });
                let result = match running.await {
                    Ok(result) => result,
                    Err(e) => Err(JobError::Aborted {
                        page_id,
                        reason: e.to_string(),
                    }),
                };
                let settlement = queue.settle(delivery, &result);

                match (&result, settlement) {
                    (Err(e), Settlement::Redelivered) => {
                        warn!(page_id = %delivery.page_id, error = %e, "job will be delivered again")
                    }
                    (Err(e), Settlement::Discarded) => {
                        error!(page_id = %delivery.page_id, attempt = delivery.attempt, error = %e, "job discarded")
                    }
                    _ => {}
                }

                outcomes.push(DeliveryOutcome {
                    delivery,
                    result,
                    settlement,
                });
            }
            outcomes
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(mut finished) => outcomes.append(&mut finished),
            Err(e) => error!(error = %e, "worker task panicked"),
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobSettings;
    use crate::error::FetchError;
    use crate::job::fakes::{FakeFetcher, FakeProber};
    use crate::model::NetworkErrorKind;
    use crate::store::{LinkStore, MemoryStore};

    fn job_with(store: Arc<MemoryStore>, fetcher: FakeFetcher) -> Arc<LinkCheckJob> {
        Arc::new(LinkCheckJob::new(
            store,
            Arc::new(fetcher),
            Arc::new(FakeProber::default()),
            JobSettings::default(),
        ))
    }

    #[tokio::test]
    async fn test_next_on_empty_queue_returns_none() {
        let queue = JobQueue::new(3);
        assert_eq!(queue.next().await, None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_deliveries_come_out_in_order() {
        let queue = JobQueue::new(3);
        let (a, b) = (PageId::new(), PageId::new());
        queue.enqueue(a).unwrap();
        queue.enqueue(b).unwrap();

        assert_eq!(queue.next().await.map(|d| d.page_id), Some(a));
        assert_eq!(queue.next().await.map(|d| d.page_id), Some(b));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_queue_refuses_new_keys() {
        let queue = JobQueue::new(3);
        queue.close();
        assert_eq!(queue.enqueue(PageId::new()), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_transient_failure_is_redelivered_until_limit() {
        let queue = JobQueue::new(2);
        let page_id = PageId::new();
        queue.enqueue(page_id).unwrap();
        let failure: Result<JobReport, JobError> = Err(JobError::SourceFetch {
            url: "http://x.com".to_string(),
            source: FetchError::Network(NetworkErrorKind::Timeout),
        });

        let first = queue.next().await.unwrap();
        assert_eq!(queue.settle(first, &failure), Settlement::Redelivered);

        let second = queue.next().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(queue.settle(second, &failure), Settlement::Discarded);

        assert_eq!(queue.next().await, None);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_redelivered() {
        let queue = JobQueue::new(5);
        let page_id = PageId::new();
        queue.enqueue(page_id).unwrap();

        let delivery = queue.next().await.unwrap();
        let settlement = queue.settle(delivery, &Err(JobError::InvalidJobKey(page_id)));

        assert_eq!(settlement, Settlement::Discarded);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_workers_drain_every_page() {
        let store = Arc::new(MemoryStore::new());
        let mut pages = Vec::new();
        let queue = Arc::new(JobQueue::new(3));
        for _ in 0..5 {
            let id = store.create_page("http://x.com").await.unwrap();
            queue.enqueue(id).unwrap();
            pages.push(id);
        }
        let job = job_with(
            store.clone(),
            FakeFetcher::html(r#"<a href="/a">a</a><a href="/b">b</a>"#),
        );

        let outcomes = run_workers(queue.clone(), job, 3).await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.settlement == Settlement::Acked));
        for page in pages {
            assert_eq!(store.link_results(page).await.unwrap().len(), 2);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_worker_retries_page_fetch_through_redelivery() {
        let store = Arc::new(MemoryStore::new());
        let page_id = store.create_page("http://x.com").await.unwrap();
        let queue = Arc::new(JobQueue::new(3));
        queue.enqueue(page_id).unwrap();
        let fetcher = FakeFetcher::flaky(
            2,
            FetchError::Network(NetworkErrorKind::ConnectionRefused),
            r#"<a href="/a">a</a>"#,
        );
        let job = job_with(store.clone(), fetcher.clone());

        let mut outcomes = run_workers(queue, job, 2).await;
        outcomes.sort_by_key(|o| o.delivery.attempt);

        let settlements: Vec<_> = outcomes.iter().map(|o| o.settlement).collect();
        assert_eq!(
            settlements,
            vec![
                Settlement::Redelivered,
                Settlement::Redelivered,
                Settlement::Acked
            ]
        );
        assert_eq!(fetcher.calls(), 3);
        // only the successful delivery wrote anything
        assert_eq!(store.link_results(page_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_discarded_and_worker_keeps_going() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(JobQueue::new(3));
        let crashing = store.create_page("http://crash.com").await.unwrap();
        let healthy = store.create_page("http://x.com").await.unwrap();
        queue.enqueue(crashing).unwrap();
        queue.enqueue(healthy).unwrap();
        let fetcher = FakeFetcher::html(r#"<a href="/a">a</a>"#).panic_on("http://crash.com");
        let job = job_with(store.clone(), fetcher);

        // One worker, so the healthy page only finishes if it survives the panic
        let outcomes = run_workers(queue.clone(), job, 1).await;

        assert_eq!(outcomes.len(), 2);
        let crashed = outcomes
            .iter()
            .find(|o| o.delivery.page_id == crashing)
            .unwrap();
        assert_eq!(crashed.settlement, Settlement::Discarded);
        assert!(matches!(
            crashed.result,
            Err(JobError::Aborted { page_id, .. }) if page_id == crashing
        ));
        let finished = outcomes
            .iter()
            .find(|o| o.delivery.page_id == healthy)
            .unwrap();
        assert_eq!(finished.settlement, Settlement::Acked);
        assert_eq!(store.link_results(healthy).await.unwrap().len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_page_is_discarded_on_first_delivery() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(JobQueue::new(3));
        queue.enqueue(PageId::new()).unwrap();
        let job = job_with(store, FakeFetcher::html(""));

        let outcomes = run_workers(queue, job, 1).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].settlement, Settlement::Discarded);
        assert!(matches!(outcomes[0].result, Err(JobError::InvalidJobKey(_))));
    }
}
