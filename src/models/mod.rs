//! Domain models
//!
//! Database-backed entities with closed status enumerations. Status strings
//! stored in the database parse into the enums here; transition functions
//! reject illegal source states instead of overwriting them.

pub mod battle;
pub mod match_queue;
pub mod submission;
pub mod user;

pub use battle::{Battle, BattleStatus, PlayerSlot};
pub use match_queue::{MatchQueueEntry, QueueStatus};
pub use submission::{Submission, SubmissionStatus, TestCaseResult};
pub use user::User;
