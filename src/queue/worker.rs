//! Queue worker loop
//!
//! Drains one queue with semaphore-bounded concurrency and an optional rate
//! limit. The handler's typed outcome drives the retry policy; exhausted
//! jobs get one `on_exhausted` callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use super::{Job, JobHandler, JobOutcome, QueueClient};
use crate::error::AppResult;

/// How long one pop blocks before re-checking shutdown and delayed jobs
const POP_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on jobs started per time window
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub max: u32,
    pub window: Duration,
}

/// A worker draining one queue
pub struct Worker {
    client: QueueClient,
    queue: &'static str,
    concurrency: usize,
    rate_limit: Option<RateLimit>,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    /// Create a new worker
    pub fn new(
        client: QueueClient,
        queue: &'static str,
        concurrency: usize,
        rate_limit: Option<RateLimit>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            queue,
            concurrency,
            rate_limit,
            shutdown,
        }
    }

    /// Run the consumer loop until shutdown is flagged
    pub async fn run<H: JobHandler>(&self, handler: Arc<H>) -> AppResult<()> {
        tracing::info!(
            queue = self.queue,
            concurrency = self.concurrency,
            "starting queue worker"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut window_start = Instant::now();
        let mut window_count = 0u32;

        while !self.shutdown.load(Ordering::SeqCst) {
            if let Err(e) = self.client.promote_due(self.queue).await {
                tracing::error!(queue = self.queue, "failed to promote delayed jobs: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }

            if let Some(limit) = self.rate_limit {
                if window_start.elapsed() >= limit.window {
                    window_start = Instant::now();
                    window_count = 0;
                }
                if window_count >= limit.max {
                    tokio::time::sleep(limit.window.saturating_sub(window_start.elapsed())).await;
                    continue;
                }
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let job = match self.client.pop(self.queue, POP_TIMEOUT).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(queue = self.queue, "failed to pop job: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            window_count += 1;

            let client = self.client.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                let _permit = permit;
                dispatch(client, handler, job).await;
            });
        }

        tracing::info!(queue = self.queue, "queue worker shutting down");
        Ok(())
    }
}

/// Run one job through its handler and apply the typed outcome
async fn dispatch<H: JobHandler>(client: QueueClient, handler: Arc<H>, mut job: Job) {
    let outcome = handler.handle(&job).await;

    let result = match outcome {
        JobOutcome::Success => client.complete(&job).await,
        JobOutcome::Retry(reason) => {
            if job.attempt < job.max_attempts {
                let delay = job.backoff.delay_for(job.attempt);
                tracing::info!(
                    queue = %job.queue,
                    job_id = %job.id,
                    attempt = job.attempt,
                    max_attempts = job.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying job: {}",
                    reason
                );
                job.attempt += 1;
                client.reschedule(&job, delay).await
            } else {
                tracing::warn!(
                    queue = %job.queue,
                    job_id = %job.id,
                    "job exhausted after {} attempts: {}",
                    job.max_attempts,
                    reason
                );
                let cleanup = client.complete(&job).await;
                handler.on_exhausted(&job, &reason).await;
                cleanup
            }
        }
        JobOutcome::Discard(reason) => {
            tracing::warn!(queue = %job.queue, job_id = %job.id, "discarding job: {}", reason);
            client.complete(&job).await
        }
    };

    if let Err(e) = result {
        tracing::error!(queue = %job.queue, job_id = %job.id, "queue bookkeeping failed: {}", e);
    }
}
