//! Matchmaking queue entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One user's entry in the matchmaking queue
///
/// At most one row per user; re-joining after a terminal status resets
/// `queued_at` (upsert-on-conflict in the repository).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MatchQueueEntry {
    pub user_id: Uuid,
    pub status: String,
    pub queued_at: DateTime<Utc>,
}

/// Queue entry status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    Waiting,
    Matched,
    Cancelled,
    Completed,
}

impl QueueStatus {
    /// Get status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Matched => "matched",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "matched" => Some(Self::Matched),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Matched)
                | (Self::Waiting, Self::Cancelled)
                | (Self::Matched, Self::Completed)
                | (Self::Matched, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_entries_do_not_move() {
        assert!(QueueStatus::Waiting.can_transition_to(QueueStatus::Matched));
        assert!(!QueueStatus::Cancelled.can_transition_to(QueueStatus::Waiting));
        assert!(!QueueStatus::Completed.can_transition_to(QueueStatus::Matched));
    }
}
