//! Sandbox boundary
//!
//! The judge consumes the sandbox as an opaque compile-and-run service. A
//! run that exceeds the time limit is a distinct fault, not a generic
//! failure.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

/// Result of compiling a submission
#[derive(Debug, Clone)]
pub enum CompileResult {
    /// Compiled; the handle identifies the prepared execution environment
    Success { handle: String },
    /// Compiler rejected the code; the log goes back to the player verbatim
    Failure { log: String },
}

/// Per-run resource limits from the exercise catalog
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub time_limit: Duration,
    pub memory_limit_mb: u64,
}

/// One run of the compiled program against a stdin payload
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub fault: Option<RunFault>,
}

/// Why a run produced no comparable output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFault {
    /// The program exceeded the exercise's time limit
    Timeout,
    /// The program exited non-zero
    Crashed { exit_code: i64 },
}

/// Opaque compile-and-run service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Compile the source once, preparing an execution environment
    async fn compile(&self, submission_id: Uuid, source: &str) -> AppResult<CompileResult>;

    /// Run the compiled program against stdin, bounded by the limits
    async fn run(&self, handle: &str, stdin: &str, limits: ResourceLimits)
    -> AppResult<RunOutput>;

    /// Tear down the execution environment
    async fn cleanup(&self, handle: &str) -> AppResult<()>;
}
