//! CodeDuel - Head-to-Head Coding Duels
//!
//! This library provides the core functionality for the CodeDuel platform:
//! rating-aware matchmaking, battle lifecycle orchestration, sandboxed
//! judging and incremental rating updates.
//!
//! # Features
//!
//! - Rating-proximity matchmaking with wait-time tolerance widening
//! - Weighted exercise difficulty selection per rating bucket
//! - Battle state machine with acceptance, resignation and timeout handling
//! - Isolated Docker sandbox execution with first-failure early exit
//! - Streak- and difficulty-sensitive K-factor rating updates
//!
//! # Architecture
//!
//! The application follows a layered architecture:
//! - **Services**: the seam an HTTP layer calls (thin layer)
//! - **Engines**: matchmaking, battle orchestration, judging (queue handlers)
//! - **Repositories**: database access
//! - **Models**: domain models with closed status enumerations

pub mod battle;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod judge;
pub mod matchmaking;
pub mod models;
pub mod queue;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
