//! Judge queue handler
//!
//! Judge jobs never auto-retry: compile errors, wrong answers and TLE are
//! terminal results that flow through the submission row, and even an
//! infrastructure fault is recorded as a failed verdict rather than
//! retried. Every judged result re-evaluates the battle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    battle::BattleOrchestrator,
    db::repositories::SubmissionRepository,
    error::AppResult,
    models::SubmissionStatus,
    queue::{Job, JobHandler, JobOutcome},
};

use super::runner::{JudgeReport, JudgeRunner};

/// Payload of a judge job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeJob {
    pub submission_id: Uuid,
    pub battle_id: Uuid,
}

/// Handler for the judge queue
pub struct JudgeJobHandler {
    pool: PgPool,
    runner: JudgeRunner,
    orchestrator: BattleOrchestrator,
}

impl JudgeJobHandler {
    /// Create a new judge handler
    pub fn new(pool: PgPool, runner: JudgeRunner, orchestrator: BattleOrchestrator) -> Self {
        Self {
            pool,
            runner,
            orchestrator,
        }
    }

    async fn process(&self, job: &JudgeJob) -> AppResult<()> {
        let Some(submission) =
            SubmissionRepository::find_by_id(&self.pool, &job.submission_id).await?
        else {
            tracing::warn!(submission_id = %job.submission_id, "judge job for unknown submission");
            return Ok(());
        };

        if !SubmissionRepository::mark_running(&self.pool, &submission.id).await? {
            tracing::warn!(
                submission_id = %submission.id,
                status = %submission.status,
                "submission not queued, skipping duplicate delivery"
            );
            return Ok(());
        }

        tracing::info!(
            submission_id = %submission.id,
            battle_id = %job.battle_id,
            exercise_id = %submission.exercise_id,
            "judging submission"
        );

        let report = match self
            .runner
            .judge(submission.id, &submission.code, &submission.exercise_id)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(submission_id = %submission.id, "judging failed: {}", e);
                JudgeReport {
                    success: false,
                    compilation_success: false,
                    compilation_error: Some(format!("Internal judging error: {e}")),
                    test_results: Vec::new(),
                }
            }
        };

        let status = if !report.compilation_success {
            SubmissionStatus::CompilationError
        } else if report.success {
            SubmissionStatus::Passed
        } else {
            SubmissionStatus::Failed
        };

        SubmissionRepository::record_result(
            &self.pool,
            &submission.id,
            status,
            report.compilation_success,
            report.compilation_error.as_deref(),
            &report.test_results,
        )
        .await?;

        tracing::info!(submission_id = %submission.id, status = %status, "submission judged");

        self.orchestrator.evaluate(job.battle_id, false).await?;

        Ok(())
    }
}

#[async_trait]
impl JobHandler for JudgeJobHandler {
    async fn handle(&self, job: &Job) -> JobOutcome {
        let payload: JudgeJob = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => return JobOutcome::Discard(format!("malformed judge payload: {e}")),
        };

        match self.process(&payload).await {
            Ok(()) => JobOutcome::Success,
            Err(e) => JobOutcome::Discard(e.to_string()),
        }
    }
}
