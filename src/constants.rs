//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

// =============================================================================
// QUEUE NAMES
// =============================================================================

/// Durable job queue names
pub mod queues {
    pub const MATCH: &str = "matchQueue";
    pub const JUDGE: &str = "judgeQueue";
    pub const BATTLE_TIMEOUT: &str = "battleTimeoutQueue";
}

// =============================================================================
// RATING SYSTEM
// =============================================================================

/// Rating assigned to a freshly registered user
pub const DEFAULT_RATING: i32 = 400;

/// Ratings never drop below this floor
pub const RATING_FLOOR: i32 = 200;

/// Base K-factor before streak/difficulty adjustments
pub const BASE_K_FACTOR: f64 = 40.0;

/// Lower clamp for the adjusted K-factor
pub const MIN_K_FACTOR: f64 = 20.0;

/// Upper clamp for the adjusted K-factor
pub const MAX_K_FACTOR: f64 = 50.0;

/// Bonus per 4 consecutive wins
pub const STREAK_BONUS_STEP: f64 = 10.0;

/// Streak bonus never exceeds this value
pub const MAX_STREAK_BONUS: f64 = 20.0;

/// Penalty per 2 consecutive losses
pub const LOSS_PENALTY_STEP: f64 = 5.0;

/// Default K constants for the resignation fast path (per user, configurable)
pub const DEFAULT_RESIGN_K: i32 = 32;

/// Weight of correctness in the performance score
pub const PERFORMANCE_CORRECTNESS_WEIGHT: f64 = 0.8;

/// Weight of submission speed in the performance score
pub const PERFORMANCE_SPEED_WEIGHT: f64 = 0.2;

// =============================================================================
// MATCHMAKING
// =============================================================================

/// Base allowed rating difference between two queued players
pub const TOLERANCE_BASE: i64 = 100;

/// Tolerance widens by this much per full minute waited
pub const TOLERANCE_PER_MINUTE: i64 = 100;

/// Tolerance never widens beyond this cap
pub const TOLERANCE_CAP: i64 = 400;

/// Delay between match retries when no opponent is available
pub const DEFAULT_MATCH_RETRY_DELAY_SECS: u64 = 5;

/// Give up matching after this many attempts
pub const DEFAULT_MATCH_MAX_ATTEMPTS: u32 = 20;

/// Parallel match jobs per worker
pub const DEFAULT_MATCH_CONCURRENCY: usize = 5;

/// Match queue rate limit: max jobs per window
pub const DEFAULT_MATCH_RATE_MAX: u32 = 10;

/// Match queue rate limit window in seconds
pub const DEFAULT_MATCH_RATE_WINDOW_SECS: u64 = 5;

// =============================================================================
// BATTLES
// =============================================================================

/// Seconds both players have to accept a pending battle
pub const DEFAULT_ACCEPT_WINDOW_SECS: u64 = 30;

/// Duration cap for ranked quick-match battles
pub const DEFAULT_QUICK_BATTLE_SECS: u64 = 120;

/// Duration cap for accepted long-form battles
pub const DEFAULT_LONG_BATTLE_SECS: u64 = 1200;

/// Interval of the stale-pending-battle sweep
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;

/// Timeout jobs retry this many times on transient failure
pub const DEFAULT_TIMEOUT_ATTEMPTS: u32 = 3;

/// Base delay for the timeout job's exponential backoff
pub const DEFAULT_TIMEOUT_BACKOFF_MS: u64 = 1000;

/// Parallel timeout jobs per worker
pub const DEFAULT_TIMEOUT_CONCURRENCY: usize = 5;

// =============================================================================
// JUDGING
// =============================================================================

/// Parallel judge jobs per worker
pub const DEFAULT_JUDGE_CONCURRENCY: usize = 3;

/// Default per-test-case time limit in seconds
pub const DEFAULT_TIME_LIMIT_SECONDS: u64 = 5;

/// Default memory limit in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;

/// Default Docker image for the sandbox
pub const DEFAULT_JUDGE_IMAGE: &str = "cpp-judge";
