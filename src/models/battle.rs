//! Battle model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Battle database model
///
/// One timed duel between exactly two users over one exercise. A user holds
/// at most one non-terminal battle at a time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Battle {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub exercise_id: String,
    pub status: String,
    pub player1_accepted: bool,
    pub player2_accepted: bool,
    pub player1_submission_id: Option<Uuid>,
    pub player2_submission_id: Option<Uuid>,
    /// `None` on a completed battle means a draw
    pub winner_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Battle {
    /// Parsed status, if the stored string is a known variant
    pub fn battle_status(&self) -> Option<BattleStatus> {
        BattleStatus::from_str(&self.status)
    }

    /// Which player slot the user occupies, if any
    pub fn slot_of(&self, user_id: Uuid) -> Option<PlayerSlot> {
        if self.player1_id == user_id {
            Some(PlayerSlot::Player1)
        } else if self.player2_id == user_id {
            Some(PlayerSlot::Player2)
        } else {
            None
        }
    }

    /// The user id occupying a slot
    pub fn player_id(&self, slot: PlayerSlot) -> Uuid {
        match slot {
            PlayerSlot::Player1 => self.player1_id,
            PlayerSlot::Player2 => self.player2_id,
        }
    }

    /// The submission currently referenced by a slot
    pub fn submission_id(&self, slot: PlayerSlot) -> Option<Uuid> {
        match slot {
            PlayerSlot::Player1 => self.player1_submission_id,
            PlayerSlot::Player2 => self.player2_submission_id,
        }
    }
}

/// The two player slots of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSlot {
    Player1,
    Player2,
}

impl PlayerSlot {
    /// The opposing slot
    pub fn other(&self) -> Self {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }
}

/// Battle status enum
///
/// `Waiting` is a pre-active synonym surfaced to clients; it follows the
/// same transitions as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleStatus {
    Pending,
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl BattleStatus {
    /// Get status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// No transitions leave a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending | Self::Waiting, Self::Active) => true,
            (Self::Pending | Self::Waiting, Self::Cancelled) => true,
            (Self::Active, Self::Completed | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_all_transitions() {
        for terminal in [BattleStatus::Completed, BattleStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                BattleStatus::Pending,
                BattleStatus::Active,
                BattleStatus::Completed,
                BattleStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_activates_or_cancels() {
        assert!(BattleStatus::Pending.can_transition_to(BattleStatus::Active));
        assert!(BattleStatus::Pending.can_transition_to(BattleStatus::Cancelled));
        assert!(!BattleStatus::Pending.can_transition_to(BattleStatus::Completed));
        assert!(BattleStatus::Active.can_transition_to(BattleStatus::Completed));
    }
}
