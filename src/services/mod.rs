//! Business logic services

pub mod battle_service;

pub use battle_service::{BattleService, MatchmakingStatus, QueueTicket, SubmissionTicket};
