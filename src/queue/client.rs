//! Queue client
//!
//! Per queue, four Redis keys: a ready list, a delayed zset scored by
//! ready-at millis, a hash of job envelopes, and an id set used for
//! deterministic-id dedupe. The client is explicitly constructed and passed
//! into every worker and engine; there is no shared global connection.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use super::{Backoff, Job};
use crate::error::AppResult;

/// Options for scheduling one job
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Delay before the job becomes ready
    pub delay: Option<Duration>,
    /// Deterministic id; scheduling the same id twice is a no-op
    pub job_id: Option<String>,
    /// Total delivery attempts (0 is treated as 1)
    pub attempts: u32,
    /// Backoff between retry deliveries
    pub backoff: Option<Backoff>,
}

/// Redis-backed queue client
#[derive(Clone)]
pub struct QueueClient {
    redis: ConnectionManager,
}

impl QueueClient {
    /// Create a new queue client
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Schedule a job. Returns false when a job with the same deterministic
    /// id is already scheduled or in flight.
    pub async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> AppResult<bool> {
        let mut conn = self.redis.clone();

        let explicit_id = options.job_id.is_some();
        let id = options
            .job_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let added: i64 = conn.sadd(ids_key(queue), &id).await?;
        if added == 0 && explicit_id {
            tracing::debug!(queue, job_id = %id, "job already scheduled, skipping");
            return Ok(false);
        }

        let job = Job {
            id: id.clone(),
            queue: queue.to_string(),
            payload,
            attempt: 1,
            max_attempts: options.attempts.max(1),
            backoff: options.backoff.unwrap_or(Backoff::None),
        };

        self.store(&mut conn, &job, options.delay.unwrap_or(Duration::ZERO))
            .await?;

        Ok(true)
    }

    /// Best-effort cancellation of a scheduled job
    pub async fn cancel(&self, queue: &str, job_id: &str) -> AppResult<()> {
        let mut conn = self.redis.clone();

        let _: () = conn.zrem(delayed_key(queue), job_id).await?;
        let _: () = conn.hdel(jobs_key(queue), job_id).await?;
        let _: () = conn.srem(ids_key(queue), job_id).await?;

        Ok(())
    }

    /// Move due delayed jobs onto the ready list
    pub async fn promote_due(&self, queue: &str) -> AppResult<()> {
        let mut conn = self.redis.clone();
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn
            .zrangebyscore_limit(delayed_key(queue), 0i64, now, 0, 64)
            .await?;

        for id in due {
            // Whichever worker removes the zset member owns the promotion.
            let removed: i64 = conn.zrem(delayed_key(queue), &id).await?;
            if removed == 1 {
                conn.lpush::<_, _, ()>(ready_key(queue), &id).await?;
            }
        }

        Ok(())
    }

    /// Block for up to `timeout` waiting for a ready job.
    ///
    /// A popped id whose envelope was cancelled in flight yields `None`.
    pub async fn pop(&self, queue: &str, timeout: Duration) -> AppResult<Option<Job>> {
        let mut conn = self.redis.clone();

        let popped: Option<(String, String)> = conn
            .brpop(ready_key(queue), timeout.as_secs_f64())
            .await?;

        let Some((_, id)) = popped else {
            return Ok(None);
        };

        let envelope: Option<String> = conn.hget(jobs_key(queue), &id).await?;
        match envelope {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => {
                let _: () = conn.srem(ids_key(queue), &id).await?;
                Ok(None)
            }
        }
    }

    /// Drop a finished job's envelope and release its dedupe id
    pub async fn complete(&self, job: &Job) -> AppResult<()> {
        let mut conn = self.redis.clone();

        let _: () = conn.hdel(jobs_key(&job.queue), &job.id).await?;
        let _: () = conn.srem(ids_key(&job.queue), &job.id).await?;

        Ok(())
    }

    /// Re-schedule a job for a retry delivery after `delay`
    pub async fn reschedule(&self, job: &Job, delay: Duration) -> AppResult<()> {
        let mut conn = self.redis.clone();
        self.store(&mut conn, job, delay).await
    }

    async fn store(
        &self,
        conn: &mut ConnectionManager,
        job: &Job,
        delay: Duration,
    ) -> AppResult<()> {
        let envelope = serde_json::to_string(job)?;
        let _: () = conn.hset(jobs_key(&job.queue), &job.id, envelope).await?;

        if delay.is_zero() {
            conn.lpush::<_, _, ()>(ready_key(&job.queue), &job.id).await?;
        } else {
            let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
            conn.zadd::<_, _, _, ()>(delayed_key(&job.queue), &job.id, ready_at)
                .await?;
        }

        Ok(())
    }
}

fn ready_key(queue: &str) -> String {
    format!("queue:{queue}:ready")
}

fn delayed_key(queue: &str) -> String {
    format!("queue:{queue}:delayed")
}

fn jobs_key(queue: &str) -> String {
    format!("queue:{queue}:jobs")
}

fn ids_key(queue: &str) -> String {
    format!("queue:{queue}:ids")
}
