//! Matchmaking queue repository

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{MatchQueueEntry, QueueStatus},
};

/// A waiting player joined with their current rating
#[derive(Debug, sqlx::FromRow)]
pub struct WaitingPlayer {
    pub user_id: Uuid,
    pub rating: i32,
    pub queued_at: DateTime<Utc>,
}

/// Repository for matchmaking queue operations
pub struct MatchQueueRepository;

impl MatchQueueRepository {
    /// Put a user into the queue as `waiting`.
    ///
    /// Re-joining while already waiting is a no-op; re-joining after a
    /// terminal status resets the entry and its `queued_at`.
    pub async fn upsert_waiting(pool: &PgPool, user_id: &Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO match_queue (user_id, status, queued_at)
            VALUES ($1, 'waiting', NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET status = EXCLUDED.status,
                queued_at = EXCLUDED.queued_at
            WHERE match_queue.status <> 'waiting'
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Whether the user currently has a `waiting` entry
    pub async fn is_waiting(pool: &PgPool, user_id: &Uuid) -> AppResult<bool> {
        let waiting: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM match_queue WHERE user_id = $1 AND status = 'waiting')"#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(waiting)
    }

    /// The user's waiting entry joined with their rating, if still waiting
    pub async fn waiting_entry(pool: &PgPool, user_id: &Uuid) -> AppResult<Option<WaitingPlayer>> {
        let entry = sqlx::query_as::<_, WaitingPlayer>(
            r#"
            SELECT mq.user_id, u.rating, mq.queued_at
            FROM match_queue mq
            JOIN users u ON u.id = mq.user_id
            WHERE mq.user_id = $1 AND mq.status = 'waiting'
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(entry)
    }

    /// The raw entry regardless of status
    pub async fn find_entry(pool: &PgPool, user_id: &Uuid) -> AppResult<Option<MatchQueueEntry>> {
        let entry = sqlx::query_as::<_, MatchQueueEntry>(
            r#"SELECT * FROM match_queue WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(entry)
    }

    /// Find the oldest-waiting opponent within the rating tolerance
    pub async fn find_opponent(
        pool: &PgPool,
        user_id: &Uuid,
        rating: i32,
        tolerance: i64,
    ) -> AppResult<Option<WaitingPlayer>> {
        let opponent = sqlx::query_as::<_, WaitingPlayer>(
            r#"
            SELECT mq.user_id, u.rating, mq.queued_at
            FROM match_queue mq
            JOIN users u ON u.id = mq.user_id
            WHERE mq.user_id != $1
              AND mq.status = 'waiting'
              AND ABS(u.rating - $2) <= $3
            ORDER BY mq.queued_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(rating)
        .bind(tolerance)
        .fetch_optional(pool)
        .await?;

        Ok(opponent)
    }

    /// Whether both users are still `waiting` (guards the pairing race)
    pub async fn both_waiting(pool: &PgPool, a: &Uuid, b: &Uuid) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM match_queue WHERE user_id IN ($1, $2) AND status = 'waiting'"#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(pool)
        .await?;

        Ok(count == 2)
    }

    /// Flip both entries `waiting -> matched`, returning how many rows moved.
    ///
    /// Callers must roll back unless exactly 2 rows were updated.
    pub async fn mark_matched(conn: &mut PgConnection, a: &Uuid, b: &Uuid) -> AppResult<u64> {
        let updated = sqlx::query(
            r#"
            UPDATE match_queue SET status = 'matched'
            WHERE user_id IN ($1, $2) AND status = 'waiting'
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(conn)
        .await?
        .rows_affected();

        Ok(updated)
    }

    /// Cancel the user's entry if it is still waiting
    pub async fn cancel_if_waiting(pool: &PgPool, user_id: &Uuid) -> AppResult<bool> {
        let updated = sqlx::query(
            r#"UPDATE match_queue SET status = 'cancelled' WHERE user_id = $1 AND status = 'waiting'"#,
        )
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Cancel both users' waiting entries (no exercise available)
    pub async fn cancel_waiting_pair(pool: &PgPool, a: &Uuid, b: &Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE match_queue SET status = 'cancelled'
            WHERE user_id IN ($1, $2) AND status = 'waiting'
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Current status of the user's entry, if any
    pub async fn status_of(pool: &PgPool, user_id: &Uuid) -> AppResult<Option<QueueStatus>> {
        let entry = Self::find_entry(pool, user_id).await?;

        Ok(entry.and_then(|e| QueueStatus::from_str(&e.status)))
    }
}
