//! Matchmaking: difficulty buckets, rating tolerance and the pairing engine

pub mod difficulty;
pub mod engine;

pub use difficulty::{
    Difficulty, DifficultyBucket, bucket_for, max_rating_difference, pick_difficulty,
};
pub use engine::{MatchRequest, MatchmakingEngine, match_job_id};
