//! Battle lifecycle and timeout orchestration
//!
//! Owns every state transition of a battle after pairing: acceptance and
//! activation, re-evaluation on judged submissions and timeout firings,
//! resignation, and the sweep that cancels stale pending battles.
//! Re-evaluation is safe to invoke redundantly; the transactional finalize
//! in the repository is the at-most-once gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    catalog::ExerciseCatalog,
    config::BattleConfig,
    constants::queues,
    db::repositories::{BattleRepository, RatingWrite, SubmissionRepository, UserRepository},
    error::{AppError, AppResult},
    models::{Battle, BattleStatus, PlayerSlot, Submission, SubmissionStatus, User},
    queue::{Backoff, Job, JobHandler, JobOptions, JobOutcome, QueueClient},
};

use super::outcome::{self, Decision, PlayerEvidence};
use super::rating::{self, PlayerResult, PlayerUpdate, RatingProfile};

/// Payload of a scheduled duration-timeout job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutJob {
    pub battle_id: Uuid,
}

/// Deterministic timeout job id; re-scheduling for the same battle dedupes.
pub fn timeout_job_id(battle_id: Uuid) -> String {
    format!("battle-timeout-{battle_id}")
}

/// Schedule the battle's duration-timeout job. Idempotent via the
/// deterministic job id.
pub async fn schedule_duration_timeout(
    queue: &QueueClient,
    config: &BattleConfig,
    battle_id: Uuid,
) -> AppResult<()> {
    let scheduled = queue
        .enqueue(
            queues::BATTLE_TIMEOUT,
            serde_json::to_value(TimeoutJob { battle_id })?,
            JobOptions {
                delay: Some(config.duration_cap()),
                job_id: Some(timeout_job_id(battle_id)),
                attempts: config.timeout_attempts,
                backoff: Some(Backoff::Exponential(config.timeout_backoff_ms)),
            },
        )
        .await?;

    if scheduled {
        tracing::debug!(battle_id = %battle_id, "duration timeout scheduled");
    }

    Ok(())
}

/// Orchestrator for one battle's state machine
#[derive(Clone)]
pub struct BattleOrchestrator {
    pool: PgPool,
    queue: QueueClient,
    catalog: ExerciseCatalog,
    config: BattleConfig,
}

impl BattleOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        pool: PgPool,
        queue: QueueClient,
        catalog: ExerciseCatalog,
        config: BattleConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            catalog,
            config,
        }
    }

    /// Flag one player's acceptance of a pending battle; when both players
    /// have accepted, the battle activates and its duration timeout is
    /// scheduled. Acceptance of a battle that already moved on is a no-op.
    pub async fn accept(&self, battle_id: Uuid, user_id: Uuid) -> AppResult<Battle> {
        let battle = self.fresh(battle_id).await?;
        let slot = battle
            .slot_of(user_id)
            .ok_or_else(|| AppError::NotFound("Battle not found".to_string()))?;

        match battle.battle_status() {
            Some(status) if status.can_transition_to(BattleStatus::Active) => {}
            Some(_) => return self.fresh(battle_id).await,
            None => {
                return Err(AppError::Conflict(format!(
                    "unknown battle status: {}",
                    battle.status
                )));
            }
        }

        if BattleRepository::set_accepted(&self.pool, &battle_id, slot)
            .await?
            .is_none()
        {
            // No longer pending; someone else activated or the sweep
            // cancelled it.
            return self.fresh(battle_id).await;
        }

        if let Some(active) = BattleRepository::activate(&self.pool, &battle_id).await? {
            schedule_duration_timeout(&self.queue, &self.config, active.id).await?;
            tracing::info!(battle_id = %active.id, "both players accepted, battle active");
            return Ok(active);
        }

        self.fresh(battle_id).await
    }

    /// Immediate, unconditional finalization: the resigning player loses and
    /// the opponent wins via the simplified resignation rating path.
    pub async fn resign(&self, battle_id: Uuid, user_id: Uuid) -> AppResult<Battle> {
        let battle = self.fresh(battle_id).await?;
        let slot = battle
            .slot_of(user_id)
            .ok_or_else(|| AppError::NotFound("Battle not found".to_string()))?;

        match battle.battle_status() {
            Some(BattleStatus::Active) => {}
            Some(status) if status.is_terminal() => return Ok(battle),
            _ => {
                return Err(AppError::Conflict(
                    "battle is not active".to_string(),
                ));
            }
        }

        let winner_slot = slot.other();
        let winner_id = battle.player_id(winner_slot);

        let winner = self.load_user(&winner_id).await?;
        let loser = self.load_user(&user_id).await?;

        let winner_update = rating::resignation_update(
            &RatingProfile::from(&winner),
            loser.rating,
            PlayerResult::Win,
        );
        let loser_update = rating::resignation_update(
            &RatingProfile::from(&loser),
            winner.rating,
            PlayerResult::Loss,
        );

        let writes = [
            write_for(winner_id, winner_update),
            write_for(user_id, loser_update),
        ];

        let applied =
            BattleRepository::finalize(&self.pool, &battle_id, Some(winner_id), &writes).await?;

        if applied {
            let _ = self
                .queue
                .cancel(queues::BATTLE_TIMEOUT, &timeout_job_id(battle_id))
                .await;
            tracing::info!(
                battle_id = %battle_id,
                resigned = %user_id,
                winner = %winner_id,
                "battle resigned"
            );
        }

        self.fresh(battle_id).await
    }

    /// Re-examine the battle and finalize it if a decision can now be made.
    ///
    /// Invoked after every judged submission and on timeout firing. A
    /// terminal battle is a no-op, which makes the submission/timeout race
    /// harmless.
    pub async fn evaluate(&self, battle_id: Uuid, timeout_fired: bool) -> AppResult<()> {
        let Some(battle) = BattleRepository::find_by_id(&self.pool, &battle_id).await? else {
            tracing::warn!(battle_id = %battle_id, "re-evaluation for unknown battle");
            return Ok(());
        };

        let Some(status) = battle.battle_status() else {
            tracing::warn!(battle_id = %battle_id, status = %battle.status, "unknown battle status");
            return Ok(());
        };

        if status.is_terminal() {
            tracing::debug!(battle_id = %battle_id, "battle already terminal, skipping");
            return Ok(());
        }
        if status != BattleStatus::Active {
            // Pending battles wait for acceptance or the sweep.
            return Ok(());
        }

        let started_at = battle.started_at.unwrap_or(battle.created_at);
        let cap = self.config.duration_cap_chrono();
        let timed_out = timeout_fired || Utc::now() - started_at >= cap;

        let submission1 = self
            .load_submission(battle.submission_id(PlayerSlot::Player1))
            .await?;
        let submission2 = self
            .load_submission(battle.submission_id(PlayerSlot::Player2))
            .await?;

        let evidence1 = evidence_from(submission1.as_ref());
        let evidence2 = evidence_from(submission2.as_ref());

        let decision = outcome::resolve(&evidence1, &evidence2, timed_out);
        if decision == Decision::Defer {
            tracing::debug!(battle_id = %battle_id, timed_out, "no decision yet, deferring");
            return Ok(());
        }

        let total_cases = self
            .total_cases(&battle, submission1.as_ref(), submission2.as_ref())
            .await;

        self.finalize_scored(&battle, decision, evidence1, evidence2, started_at, total_cases)
            .await
    }

    /// Cancel pending battles whose acceptance window expired
    pub async fn sweep_stale_pending(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - self.config.accept_window();
        BattleRepository::cancel_stale_pending(&self.pool, cutoff).await
    }

    /// Spawn the periodic stale-pending sweep
    pub fn spawn_sweeper(self, shutdown: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.sweep_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }

                match self.sweep_stale_pending().await {
                    Ok(0) => {}
                    Ok(cancelled) => {
                        tracing::info!("cancelled {} stale pending battles", cancelled);
                    }
                    Err(e) => tracing::error!("pending-battle sweep failed: {}", e),
                }
            }

            tracing::info!("pending-battle sweeper shutting down");
        })
    }

    async fn finalize_scored(
        &self,
        battle: &Battle,
        decision: Decision,
        evidence1: PlayerEvidence,
        evidence2: PlayerEvidence,
        started_at: DateTime<Utc>,
        total_cases: u32,
    ) -> AppResult<()> {
        let (result1, result2, winner_id) = match decision {
            Decision::Winner(PlayerSlot::Player1) => {
                (PlayerResult::Win, PlayerResult::Loss, Some(battle.player1_id))
            }
            Decision::Winner(PlayerSlot::Player2) => {
                (PlayerResult::Loss, PlayerResult::Win, Some(battle.player2_id))
            }
            Decision::Draw => (PlayerResult::Draw, PlayerResult::Draw, None),
            Decision::Defer => return Ok(()),
        };

        let user1 = self.load_user(&battle.player1_id).await?;
        let user2 = self.load_user(&battle.player2_id).await?;

        let cap = self.config.duration_cap_chrono();
        let performance1 = rating::performance_score(
            evidence1.passed_cases,
            total_cases,
            effective_duration(evidence1.submitted_at, started_at, cap),
            cap,
        );
        let performance2 = rating::performance_score(
            evidence2.passed_cases,
            total_cases,
            effective_duration(evidence2.submitted_at, started_at, cap),
            cap,
        );

        let difficulty = self
            .catalog
            .config(&battle.exercise_id)
            .await
            .ok()
            .and_then(|c| c.difficulty_tag());
        let solved1 = if evidence1.fully_passed { difficulty } else { None };
        let solved2 = if evidence2.fully_passed { difficulty } else { None };

        let update1 = rating::scored_update(
            &RatingProfile::from(&user1),
            user2.rating,
            performance1,
            performance2,
            result1,
            solved1,
        );
        let update2 = rating::scored_update(
            &RatingProfile::from(&user2),
            user1.rating,
            performance2,
            performance1,
            result2,
            solved2,
        );

        let writes = [
            write_for(battle.player1_id, update1),
            write_for(battle.player2_id, update2),
        ];

        let applied =
            BattleRepository::finalize(&self.pool, &battle.id, winner_id, &writes).await?;

        if applied {
            let _ = self
                .queue
                .cancel(queues::BATTLE_TIMEOUT, &timeout_job_id(battle.id))
                .await;
            tracing::info!(
                battle_id = %battle.id,
                winner = ?winner_id,
                delta1 = update1.delta,
                delta2 = update2.delta,
                "battle finalized"
            );
        } else {
            tracing::debug!(battle_id = %battle.id, "lost the finalization race, skipping");
        }

        Ok(())
    }

    /// Total test cases of the battle's exercise, degrading to the judged
    /// result counts when the catalog is unreadable.
    async fn total_cases(
        &self,
        battle: &Battle,
        submission1: Option<&Submission>,
        submission2: Option<&Submission>,
    ) -> u32 {
        match self.catalog.test_case_count(&battle.exercise_id).await {
            Ok(count) if count > 0 => count as u32,
            Ok(_) | Err(_) => {
                let fallback = submission1
                    .map(|s| s.test_results.len())
                    .unwrap_or(0)
                    .max(submission2.map(|s| s.test_results.len()).unwrap_or(0));
                tracing::debug!(
                    battle_id = %battle.id,
                    exercise_id = %battle.exercise_id,
                    "catalog unavailable, using judged result count"
                );
                fallback.max(1) as u32
            }
        }
    }

    async fn load_submission(&self, id: Option<Uuid>) -> AppResult<Option<Submission>> {
        match id {
            Some(id) => SubmissionRepository::find_by_id(&self.pool, &id).await,
            None => Ok(None),
        }
    }

    async fn load_user(&self, id: &Uuid) -> AppResult<User> {
        UserRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    async fn fresh(&self, battle_id: Uuid) -> AppResult<Battle> {
        BattleRepository::find_by_id(&self.pool, &battle_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Battle not found".to_string()))
    }
}

/// Judged evidence for one slot. Queued or running submissions are not
/// evidence yet.
fn evidence_from(submission: Option<&Submission>) -> PlayerEvidence {
    match submission {
        Some(sub) if sub.is_judged() => PlayerEvidence {
            submitted_at: Some(sub.submitted_at),
            passed_cases: sub.passed_cases(),
            fully_passed: sub.submission_status() == Some(SubmissionStatus::Passed),
        },
        _ => PlayerEvidence::default(),
    }
}

/// Time from battle start to submission, clamped into [0, cap]; a missing
/// submission counts as the full cap.
fn effective_duration(
    submitted_at: Option<DateTime<Utc>>,
    started_at: DateTime<Utc>,
    cap: chrono::Duration,
) -> chrono::Duration {
    match submitted_at {
        Some(at) => (at - started_at).clamp(chrono::Duration::zero(), cap),
        None => cap,
    }
}

fn write_for(user_id: Uuid, update: PlayerUpdate) -> RatingWrite {
    RatingWrite {
        user_id,
        rating: update.rating,
        win_streak: update.win_streak,
        loss_streak: update.loss_streak,
        k_factor: update.k_factor,
    }
}

/// Handler for the battle timeout queue. Transient failures retry with the
/// job's exponential backoff; a timeout firing against a terminal battle is
/// absorbed by `evaluate`.
pub struct TimeoutJobHandler {
    orchestrator: BattleOrchestrator,
}

impl TimeoutJobHandler {
    /// Create a new timeout handler
    pub fn new(orchestrator: BattleOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler for TimeoutJobHandler {
    async fn handle(&self, job: &Job) -> JobOutcome {
        let payload: TimeoutJob = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => return JobOutcome::Discard(format!("malformed timeout payload: {e}")),
        };

        match self.orchestrator.evaluate(payload.battle_id, true).await {
            Ok(()) => JobOutcome::Success,
            Err(e) => JobOutcome::Retry(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;
    use crate::models::TestCaseResult;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn submission(status: &str, passed: u32, total: u32, submitted_secs: i64) -> Submission {
        let results = (0..total)
            .map(|i| TestCaseResult {
                test_case: (i + 1).to_string(),
                passed: i < passed,
                expected: String::new(),
                actual: String::new(),
                error: None,
            })
            .collect();

        Submission {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            exercise_id: "001-sum".to_string(),
            code: String::new(),
            language: Some("cpp".to_string()),
            status: status.to_string(),
            compilation_success: status != "compilation_error",
            compilation_error: None,
            test_results: Json(results),
            submitted_at: at(submitted_secs),
        }
    }

    #[test]
    fn in_flight_submissions_are_not_evidence() {
        let queued = submission("queued", 0, 0, 10);
        let running = submission("running", 0, 0, 10);
        assert!(evidence_from(Some(&queued)).submitted_at.is_none());
        assert!(evidence_from(Some(&running)).submitted_at.is_none());
        assert!(evidence_from(None).submitted_at.is_none());
    }

    #[test]
    fn judged_submissions_carry_their_pass_counts() {
        let partial = submission("failed", 3, 5, 42);
        let evidence = evidence_from(Some(&partial));
        assert_eq!(evidence.submitted_at, Some(at(42)));
        assert_eq!(evidence.passed_cases, 3);
        assert!(!evidence.fully_passed);

        let full = submission("passed", 5, 5, 42);
        assert!(evidence_from(Some(&full)).fully_passed);

        let compile_error = submission("compilation_error", 0, 0, 42);
        let evidence = evidence_from(Some(&compile_error));
        assert_eq!(evidence.passed_cases, 0);
        assert!(evidence.submitted_at.is_some());
    }

    #[test]
    fn effective_duration_clamps_to_the_cap() {
        let cap = chrono::Duration::seconds(120);
        let start = at(0);

        assert_eq!(
            effective_duration(Some(at(30)), start, cap),
            chrono::Duration::seconds(30)
        );
        // a submission judged after the cap counts as the cap
        assert_eq!(effective_duration(Some(at(600)), start, cap), cap);
        // clock skew cannot go negative
        assert_eq!(
            effective_duration(Some(at(-5)), start, cap),
            chrono::Duration::zero()
        );
        // no submission counts as max duration
        assert_eq!(effective_duration(None, start, cap), cap);
    }
}
