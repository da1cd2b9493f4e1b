//! Submission repository

use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Submission, SubmissionStatus, TestCaseResult},
};

/// Repository for submission database operations
pub struct SubmissionRepository;

impl SubmissionRepository {
    /// Create a new queued submission
    pub async fn create(
        pool: &PgPool,
        user_id: &Uuid,
        exercise_id: &str,
        code: &str,
        language: Option<&str>,
    ) -> AppResult<Submission> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (user_id, exercise_id, code, language, status)
            VALUES ($1, $2, $3, $4, 'queued')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(exercise_id)
        .bind(code)
        .bind(language)
        .fetch_one(pool)
        .await?;

        Ok(submission)
    }

    /// Find submission by ID
    pub async fn find_by_id(pool: &PgPool, id: &Uuid) -> AppResult<Option<Submission>> {
        let submission =
            sqlx::query_as::<_, Submission>(r#"SELECT * FROM submissions WHERE id = $1"#)
                .bind(id)
                .fetch_optional(pool)
                .await?;

        Ok(submission)
    }

    /// Move a queued submission to `running`. Returns false when the
    /// submission was not in `queued` (duplicate delivery).
    pub async fn mark_running(pool: &PgPool, id: &Uuid) -> AppResult<bool> {
        let updated = sqlx::query(
            r#"UPDATE submissions SET status = 'running' WHERE id = $1 AND status = 'queued'"#,
        )
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Write the judged result exactly once.
    ///
    /// Conditional on `running` so a redelivered job cannot overwrite an
    /// already-recorded verdict.
    pub async fn record_result(
        pool: &PgPool,
        id: &Uuid,
        status: SubmissionStatus,
        compilation_success: bool,
        compilation_error: Option<&str>,
        test_results: &[TestCaseResult],
    ) -> AppResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $2,
                compilation_success = $3,
                compilation_error = $4,
                test_results = $5
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(compilation_success)
        .bind(compilation_error)
        .bind(Json(test_results))
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }
}
