//! Job Queue Substrate
//!
//! Redis-backed delayed FIFO queues drained by worker processes with bounded
//! concurrency. Jobs carry their retry policy declaratively; handlers return
//! a typed outcome and never re-enqueue themselves.

pub mod client;
pub mod worker;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{JobOptions, QueueClient};
pub use worker::{RateLimit, Worker};

/// One scheduled unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: serde_json::Value,
    /// 1-based delivery count
    pub attempt: u32,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Declarative retry backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "base_ms", rename_all = "snake_case")]
pub enum Backoff {
    None,
    Fixed(u64),
    Exponential(u64),
}

impl Backoff {
    /// Delay before the next delivery, given the attempt that just failed
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(ms) => Duration::from_millis(*ms),
            Self::Exponential(base_ms) => {
                let shift = failed_attempt.saturating_sub(1).min(16);
                Duration::from_millis(base_ms.saturating_mul(1 << shift))
            }
        }
    }
}

/// What a handler decided about one delivered job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Work done (or safely absorbed as a no-op)
    Success,
    /// Retryable operational fault; the worker applies the job's backoff
    Retry(String),
    /// Terminal failure; the job is dropped without retry
    Discard(String),
}

/// A queue consumer. One handler instance serves all of a queue's jobs.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job) -> JobOutcome;

    /// Called once when a job exhausts its retry attempts
    async fn on_exhausted(&self, _job: &Job, _reason: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(5000);
        assert_eq!(backoff.delay_for(1), Duration::from_millis(5000));
        assert_eq!(backoff.delay_for(7), Duration::from_millis(5000));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::Exponential(1000);
        assert_eq!(backoff.delay_for(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn job_envelope_round_trips() {
        let job = Job {
            id: "battle-timeout-1234".to_string(),
            queue: "battleTimeoutQueue".to_string(),
            payload: serde_json::json!({"battle_id": "00000000-0000-0000-0000-000000000000"}),
            attempt: 2,
            max_attempts: 3,
            backoff: Backoff::Exponential(1000),
        };

        let raw = serde_json::to_string(&job).unwrap();
        let parsed: Job = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.attempt, 2);
        assert_eq!(parsed.backoff, Backoff::Exponential(1000));
    }
}
