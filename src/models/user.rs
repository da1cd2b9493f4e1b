//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User database model
///
/// Rating, streaks and the stored K-factor are mutated only by battle
/// finalization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub rating: i32,
    pub win_streak: i32,
    pub loss_streak: i32,
    /// K-factor applied by the most recent rating update
    pub k_factor: i32,
    /// K constant for the resignation fast path when this user wins
    pub k_win: i32,
    /// K constant for the resignation fast path when this user loses
    pub k_lose: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
