//! Battle repository

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Battle, BattleStatus, PlayerSlot},
};

/// The per-player write applied when a battle finalizes
#[derive(Debug, Clone, Copy)]
pub struct RatingWrite {
    pub user_id: Uuid,
    pub rating: i32,
    pub win_streak: i32,
    pub loss_streak: i32,
    pub k_factor: i32,
}

/// Repository for battle database operations
pub struct BattleRepository;

impl BattleRepository {
    /// Create a battle inside the pairing transaction.
    ///
    /// `started_at` is stamped only when the battle starts directly `active`
    /// (quick match); a `pending` battle is stamped on activation.
    pub async fn create(
        conn: &mut PgConnection,
        player1_id: &Uuid,
        player2_id: &Uuid,
        exercise_id: &str,
        status: BattleStatus,
    ) -> AppResult<Battle> {
        let battle = sqlx::query_as::<_, Battle>(
            r#"
            INSERT INTO battles (player1_id, player2_id, exercise_id, status, started_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 = 'active' THEN NOW() ELSE NULL END)
            RETURNING *
            "#,
        )
        .bind(player1_id)
        .bind(player2_id)
        .bind(exercise_id)
        .bind(status.as_str())
        .fetch_one(conn)
        .await?;

        Ok(battle)
    }

    /// Find battle by ID
    pub async fn find_by_id(pool: &PgPool, id: &Uuid) -> AppResult<Option<Battle>> {
        let battle = sqlx::query_as::<_, Battle>(r#"SELECT * FROM battles WHERE id = $1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(battle)
    }

    /// The user's most recent non-terminal battle, if any
    pub async fn find_active_for_user(pool: &PgPool, user_id: &Uuid) -> AppResult<Option<Battle>> {
        let battle = sqlx::query_as::<_, Battle>(
            r#"
            SELECT * FROM battles
            WHERE (player1_id = $1 OR player2_id = $1)
              AND status IN ('pending', 'waiting', 'active')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(battle)
    }

    /// Flag one player's acceptance while the battle is still pending
    pub async fn set_accepted(
        pool: &PgPool,
        battle_id: &Uuid,
        slot: PlayerSlot,
    ) -> AppResult<Option<Battle>> {
        let column = match slot {
            PlayerSlot::Player1 => "player1_accepted",
            PlayerSlot::Player2 => "player2_accepted",
        };

        let query = format!(
            "UPDATE battles SET {column} = TRUE WHERE id = $1 AND status = 'pending' RETURNING *"
        );

        let battle = sqlx::query_as::<_, Battle>(&query)
            .bind(battle_id)
            .fetch_optional(pool)
            .await?;

        Ok(battle)
    }

    /// Activate a pending battle once both players accepted.
    ///
    /// Conditional on the source state, so a concurrent activation or
    /// cancellation wins cleanly.
    pub async fn activate(pool: &PgPool, battle_id: &Uuid) -> AppResult<Option<Battle>> {
        let battle = sqlx::query_as::<_, Battle>(
            r#"
            UPDATE battles SET status = 'active', started_at = NOW()
            WHERE id = $1 AND status = 'pending' AND player1_accepted AND player2_accepted
            RETURNING *
            "#,
        )
        .bind(battle_id)
        .fetch_optional(pool)
        .await?;

        Ok(battle)
    }

    /// Point a player's submission slot at a new submission (last write wins)
    pub async fn set_submission_slot(
        pool: &PgPool,
        battle_id: &Uuid,
        slot: PlayerSlot,
        submission_id: &Uuid,
    ) -> AppResult<()> {
        let column = match slot {
            PlayerSlot::Player1 => "player1_submission_id",
            PlayerSlot::Player2 => "player2_submission_id",
        };

        let query = format!("UPDATE battles SET {column} = $2 WHERE id = $1");

        sqlx::query(&query)
            .bind(battle_id)
            .bind(submission_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Finalize a battle: terminal status, winner, rating writes and queue
    /// entry completion, all in one transaction.
    ///
    /// The conditional battle update is the at-most-once gate: whichever
    /// trigger loses the race sees zero affected rows and performs no rating
    /// mutation. User rows are locked ordered by id to avoid deadlock between
    /// two finalizing battles sharing a player.
    pub async fn finalize(
        pool: &PgPool,
        battle_id: &Uuid,
        winner_id: Option<Uuid>,
        writes: &[RatingWrite; 2],
    ) -> AppResult<bool> {
        let mut tx = pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE battles SET status = 'completed', winner_id = $2, ended_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(battle_id)
        .bind(winner_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let mut ids = vec![writes[0].user_id, writes[1].user_id];
        ids.sort();

        sqlx::query(r#"SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE"#)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        for write in writes {
            sqlx::query(
                r#"
                UPDATE users
                SET rating = $2, win_streak = $3, loss_streak = $4, k_factor = $5, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(write.user_id)
            .bind(write.rating)
            .bind(write.win_streak)
            .bind(write.loss_streak)
            .bind(write.k_factor)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"UPDATE match_queue SET status = 'completed' WHERE user_id = ANY($1) AND status = 'matched'"#,
        )
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Cancel pending battles whose acceptance window expired, freeing both
    /// players' queue entries. Returns the number of battles cancelled.
    pub async fn cancel_stale_pending(pool: &PgPool, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut tx = pool.begin().await?;

        let stale = sqlx::query_as::<_, Battle>(
            r#"
            UPDATE battles SET status = 'cancelled', ended_at = NOW()
            WHERE status = 'pending' AND created_at < $1
            RETURNING *
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        if stale.is_empty() {
            tx.rollback().await?;
            return Ok(0);
        }

        let players: Vec<Uuid> = stale
            .iter()
            .flat_map(|b| [b.player1_id, b.player2_id])
            .collect();

        sqlx::query(
            r#"UPDATE match_queue SET status = 'cancelled' WHERE user_id = ANY($1) AND status = 'matched'"#,
        )
        .bind(&players)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(stale.len() as u64)
    }
}
