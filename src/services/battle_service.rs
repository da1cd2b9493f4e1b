//! Battle service
//!
//! The seam an HTTP layer calls into: queue membership, acceptance,
//! resignation and code submission. Submissions pass the protected-code
//! guard before a row is created or a judge job enqueued.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    battle::BattleOrchestrator,
    catalog::guard::verify_protected_lines,
    constants::queues,
    db::repositories::{
        BattleRepository, MatchQueueRepository, SubmissionRepository, UserRepository,
    },
    error::{AppError, AppResult},
    judge::JudgeJob,
    matchmaking::{MatchRequest, bucket_for, match_job_id},
    models::{Battle, BattleStatus},
    queue::{Backoff, JobOptions},
    state::AppState,
    utils::lang::detect_language,
};

/// Receipt returned when a user joins the queue
#[derive(Debug, Serialize)]
pub struct QueueTicket {
    pub rating: i32,
    pub search_difficulty: &'static str,
}

/// A user's current matchmaking situation
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchmakingStatus {
    Queued {
        queued_at: DateTime<Utc>,
        rating: i32,
        search_difficulty: &'static str,
    },
    Matched {
        battle: Battle,
    },
    None,
}

/// Receipt returned for an accepted submission
#[derive(Debug, Serialize)]
pub struct SubmissionTicket {
    pub submission_id: Uuid,
}

/// Battle service for business logic
pub struct BattleService;

impl BattleService {
    /// Join the matchmaking queue and schedule the match-request job
    pub async fn join_queue(state: &AppState, user_id: &Uuid) -> AppResult<QueueTicket> {
        if MatchQueueRepository::is_waiting(state.db(), user_id).await? {
            return Err(AppError::AlreadyExists(
                "You are already in the matchmaking queue".to_string(),
            ));
        }

        if BattleRepository::find_active_for_user(state.db(), user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You already have an active battle".to_string(),
            ));
        }

        let rating = UserRepository::find_rating(state.db(), user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        MatchQueueRepository::upsert_waiting(state.db(), user_id).await?;

        let matchmaking = &state.config().matchmaking;
        state
            .queue()
            .enqueue(
                queues::MATCH,
                serde_json::to_value(MatchRequest { user_id: *user_id })?,
                JobOptions {
                    delay: None,
                    job_id: Some(match_job_id(*user_id)),
                    attempts: matchmaking.max_attempts,
                    backoff: Some(Backoff::Fixed(matchmaking.retry_delay().as_millis() as u64)),
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, rating, "user joined the matchmaking queue");

        Ok(QueueTicket {
            rating,
            search_difficulty: bucket_for(rating as f64).label,
        })
    }

    /// Leave the queue and cancel the pending match job (best effort)
    pub async fn leave_queue(state: &AppState, user_id: &Uuid) -> AppResult<()> {
        MatchQueueRepository::cancel_if_waiting(state.db(), user_id).await?;

        let _ = state
            .queue()
            .cancel(queues::MATCH, &match_job_id(*user_id))
            .await;

        tracing::info!(user_id = %user_id, "user left the matchmaking queue");

        Ok(())
    }

    /// The user's current matchmaking status
    pub async fn queue_status(state: &AppState, user_id: &Uuid) -> AppResult<MatchmakingStatus> {
        if let Some(entry) = MatchQueueRepository::waiting_entry(state.db(), user_id).await? {
            return Ok(MatchmakingStatus::Queued {
                queued_at: entry.queued_at,
                rating: entry.rating,
                search_difficulty: bucket_for(entry.rating as f64).label,
            });
        }

        if let Some(battle) = BattleRepository::find_active_for_user(state.db(), user_id).await? {
            return Ok(MatchmakingStatus::Matched { battle });
        }

        Ok(MatchmakingStatus::None)
    }

    /// Accept a pending battle
    pub async fn accept_battle(
        state: &AppState,
        user_id: &Uuid,
        battle_id: &Uuid,
    ) -> AppResult<Battle> {
        Self::orchestrator(state).accept(*battle_id, *user_id).await
    }

    /// Resign from an active battle
    pub async fn resign_battle(
        state: &AppState,
        user_id: &Uuid,
        battle_id: &Uuid,
    ) -> AppResult<Battle> {
        Self::orchestrator(state).resign(*battle_id, *user_id).await
    }

    /// Submit code for an active battle: guard the protected starter lines,
    /// create the submission, point the player's slot at it and enqueue the
    /// judge job.
    pub async fn submit_code(
        state: &AppState,
        user_id: &Uuid,
        battle_id: &Uuid,
        code: &str,
    ) -> AppResult<SubmissionTicket> {
        if code.trim().is_empty() {
            return Err(AppError::Validation("Code is required".to_string()));
        }

        let battle = BattleRepository::find_by_id(state.db(), battle_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Battle not found".to_string()))?;

        let slot = battle
            .slot_of(*user_id)
            .ok_or_else(|| AppError::NotFound("Battle not found".to_string()))?;

        if battle.battle_status() != Some(BattleStatus::Active) {
            return Err(AppError::Conflict("Battle is not active".to_string()));
        }

        Self::check_protected_code(state, &battle.exercise_id, code).await?;

        let language = detect_language(code);
        let submission = SubmissionRepository::create(
            state.db(),
            user_id,
            &battle.exercise_id,
            code,
            language,
        )
        .await?;

        // Last write wins: a re-submission simply replaces the slot.
        BattleRepository::set_submission_slot(state.db(), battle_id, slot, &submission.id)
            .await?;

        state
            .queue()
            .enqueue(
                queues::JUDGE,
                serde_json::to_value(JudgeJob {
                    submission_id: submission.id,
                    battle_id: *battle_id,
                })?,
                JobOptions {
                    delay: None,
                    job_id: Some(format!("judge-{}", submission.id)),
                    attempts: 1,
                    backoff: None,
                },
            )
            .await?;

        tracing::info!(
            submission_id = %submission.id,
            battle_id = %battle_id,
            user_id = %user_id,
            "submission queued for judging"
        );

        Ok(SubmissionTicket {
            submission_id: submission.id,
        })
    }

    /// Verify the submission keeps the exercise's protected starter lines
    /// intact. Exercises without a readable config or starter template skip
    /// the guard.
    async fn check_protected_code(
        state: &AppState,
        exercise_id: &str,
        code: &str,
    ) -> AppResult<()> {
        let Ok(config) = state.catalog().config(exercise_id).await else {
            return Ok(());
        };

        let Some(starter) = state.catalog().starter_code(exercise_id, &config).await? else {
            return Ok(());
        };

        verify_protected_lines(&starter, code, config.editable_start, config.editable_end)
            .map_err(|violation| AppError::Validation(violation.to_string()))
    }

    fn orchestrator(state: &AppState) -> BattleOrchestrator {
        BattleOrchestrator::new(
            state.db().clone(),
            state.queue().clone(),
            state.catalog().clone(),
            state.config().battle.clone(),
        )
    }
}
