//! Battle lifecycle, outcome resolution and rating updates

pub mod lifecycle;
pub mod outcome;
pub mod rating;

pub use lifecycle::{BattleOrchestrator, TimeoutJob, TimeoutJobHandler};
pub use outcome::{Decision, PlayerEvidence};
pub use rating::{PlayerResult, PlayerUpdate, RatingProfile};
