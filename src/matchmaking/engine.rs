//! Pairing engine
//!
//! Consumes match-request jobs, finds a rating-compatible opponent with a
//! tolerance that widens over wait time, picks an exercise from the weighted
//! difficulty bucket, and creates the battle atomically with both queue
//! entries. "No opponent" is the only retryable failure; everything else
//! cancels the requesting user's queue entry.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    battle::lifecycle::schedule_duration_timeout,
    catalog::ExerciseCatalog,
    config::BattleConfig,
    db::repositories::{BattleRepository, MatchQueueRepository},
    error::AppResult,
    models::{BattleStatus, QueueStatus},
    queue::{Job, JobHandler, JobOutcome, QueueClient},
};

use super::difficulty::{
    self, Difficulty, bucket_for, fallback_difficulties, max_rating_difference,
};

/// Payload of a match-request job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub user_id: Uuid,
}

/// Deterministic match job id, one in-flight request per user
pub fn match_job_id(user_id: Uuid) -> String {
    format!("match-{user_id}")
}

/// What one pairing attempt concluded
#[derive(Debug)]
enum Pairing {
    /// A battle was created
    Matched,
    /// The request no longer applies (user left, raced with a sibling worker)
    Stale,
    /// Nobody compatible is waiting right now
    NoOpponent,
    /// The catalog has no exercise for any difficulty
    NoExercise,
}

/// The matchmaking pairing engine, consumed as a match-queue handler
pub struct MatchmakingEngine {
    pool: PgPool,
    queue: QueueClient,
    catalog: ExerciseCatalog,
    battle_config: BattleConfig,
}

impl MatchmakingEngine {
    /// Create a new pairing engine
    pub fn new(
        pool: PgPool,
        queue: QueueClient,
        catalog: ExerciseCatalog,
        battle_config: BattleConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            catalog,
            battle_config,
        }
    }

    async fn try_match(&self, user_id: Uuid) -> AppResult<Pairing> {
        // The user may have left the queue between enqueue and execution.
        let Some(player) = MatchQueueRepository::waiting_entry(&self.pool, &user_id).await? else {
            tracing::debug!(user_id = %user_id, "user no longer waiting, skipping match");
            return Ok(Pairing::Stale);
        };

        let waited_ms = (Utc::now() - player.queued_at).num_milliseconds();
        let tolerance = max_rating_difference(waited_ms);

        let Some(opponent) =
            MatchQueueRepository::find_opponent(&self.pool, &user_id, player.rating, tolerance)
                .await?
        else {
            return Ok(Pairing::NoOpponent);
        };

        // Double-check both are still waiting before committing work; a
        // sibling worker may have grabbed either of them.
        if !MatchQueueRepository::both_waiting(&self.pool, &user_id, &opponent.user_id).await? {
            tracing::debug!(
                user_id = %user_id,
                opponent_id = %opponent.user_id,
                "pair raced with another worker, skipping"
            );
            return Ok(Pairing::Stale);
        }

        // One non-terminal battle per user. A stale waiting entry alongside
        // an active battle is an inconsistency to absorb, not corrupt.
        if BattleRepository::find_active_for_user(&self.pool, &user_id)
            .await?
            .is_some()
        {
            tracing::warn!(user_id = %user_id, "user already has a battle, cancelling queue entry");
            MatchQueueRepository::cancel_if_waiting(&self.pool, &user_id).await?;
            return Ok(Pairing::Stale);
        }
        if BattleRepository::find_active_for_user(&self.pool, &opponent.user_id)
            .await?
            .is_some()
        {
            tracing::warn!(
                opponent_id = %opponent.user_id,
                "opponent already has a battle, cancelling their entry"
            );
            MatchQueueRepository::cancel_if_waiting(&self.pool, &opponent.user_id).await?;
            return Ok(Pairing::NoOpponent);
        }

        let average_rating = (player.rating + opponent.rating) as f64 / 2.0;
        let primary = difficulty::pick_difficulty_random(average_rating);

        let Some(exercise_id) = self.select_exercise(average_rating, primary).await else {
            tracing::error!(
                average_rating,
                "no exercises available for any difficulty, cancelling both entries"
            );
            MatchQueueRepository::cancel_waiting_pair(&self.pool, &user_id, &opponent.user_id)
                .await?;
            return Ok(Pairing::NoExercise);
        };

        let status = if self.battle_config.require_acceptance {
            BattleStatus::Pending
        } else {
            BattleStatus::Active
        };

        let mut tx = self.pool.begin().await?;

        let battle = BattleRepository::create(
            &mut *tx,
            &user_id,
            &opponent.user_id,
            &exercise_id,
            status,
        )
        .await?;

        let updated =
            MatchQueueRepository::mark_matched(&mut *tx, &user_id, &opponent.user_id).await?;
        if updated != 2 {
            tx.rollback().await?;
            tracing::debug!(
                user_id = %user_id,
                opponent_id = %opponent.user_id,
                updated,
                "only part of the pair could be matched, rolling back"
            );
            return Ok(Pairing::Stale);
        }

        tx.commit().await?;

        // Scheduled after commit so the battle definitely exists; the
        // deterministic job id makes re-scheduling a no-op.
        if status == BattleStatus::Active {
            schedule_duration_timeout(&self.queue, &self.battle_config, battle.id).await?;
        }

        tracing::info!(
            battle_id = %battle.id,
            user_id = %user_id,
            user_rating = player.rating,
            opponent_id = %opponent.user_id,
            opponent_rating = opponent.rating,
            bucket = bucket_for(average_rating).label,
            exercise_id = %exercise_id,
            "players matched"
        );

        Ok(Pairing::Matched)
    }

    /// Pick a random exercise of the primary difficulty, falling back
    /// through the bucket's difficulties and then all tags.
    async fn select_exercise(&self, average_rating: f64, primary: Difficulty) -> Option<String> {
        for difficulty in fallback_difficulties(average_rating, primary) {
            let pool = self.catalog.list_by_difficulty(difficulty).await;
            if !pool.is_empty() {
                let index = rand::rng().random_range(0..pool.len());
                return Some(pool[index].clone());
            }
        }

        None
    }
}

#[async_trait]
impl JobHandler for MatchmakingEngine {
    async fn handle(&self, job: &Job) -> JobOutcome {
        let request: MatchRequest = match serde_json::from_value(job.payload.clone()) {
            Ok(request) => request,
            Err(e) => return JobOutcome::Discard(format!("malformed match payload: {e}")),
        };

        match self.try_match(request.user_id).await {
            Ok(Pairing::Matched) | Ok(Pairing::Stale) => JobOutcome::Success,
            Ok(Pairing::NoOpponent) => JobOutcome::Retry("no opponent found".to_string()),
            Ok(Pairing::NoExercise) => {
                JobOutcome::Discard("no exercise available".to_string())
            }
            Err(e) => {
                // A sibling worker may have matched the user while this job
                // was failing; never cancel a matched entry.
                match MatchQueueRepository::status_of(&self.pool, &request.user_id).await {
                    Ok(Some(QueueStatus::Matched)) => {
                        tracing::info!(
                            user_id = %request.user_id,
                            "match job failed but user was already matched, ignoring"
                        );
                        JobOutcome::Success
                    }
                    _ => {
                        tracing::error!(user_id = %request.user_id, "match job failed: {}", e);
                        let _ =
                            MatchQueueRepository::cancel_if_waiting(&self.pool, &request.user_id)
                                .await;
                        JobOutcome::Discard(e.to_string())
                    }
                }
            }
        }
    }

    async fn on_exhausted(&self, job: &Job, _reason: &str) {
        let Ok(request) = serde_json::from_value::<MatchRequest>(job.payload.clone()) else {
            return;
        };

        tracing::info!(
            user_id = %request.user_id,
            "matchmaking gave up after {} attempts, cancelling queue entry",
            job.max_attempts
        );
        if let Err(e) =
            MatchQueueRepository::cancel_if_waiting(&self.pool, &request.user_id).await
        {
            tracing::error!(user_id = %request.user_id, "failed to cancel queue entry: {}", e);
        }
    }
}
