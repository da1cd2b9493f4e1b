//! Submission model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Submission database model
///
/// Result fields are written exactly once, by the judge worker.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exercise_id: String,
    #[serde(skip_serializing)]
    pub code: String,
    pub language: Option<String>,
    pub status: String,
    pub compilation_success: bool,
    pub compilation_error: Option<String>,
    pub test_results: Json<Vec<TestCaseResult>>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    /// Parsed status, if the stored string is a known variant
    pub fn submission_status(&self) -> Option<SubmissionStatus> {
        SubmissionStatus::from_str(&self.status)
    }

    /// Whether the judge has produced a final result
    pub fn is_judged(&self) -> bool {
        self.submission_status().is_some_and(|s| s.is_final())
    }

    /// Number of test cases that passed
    pub fn passed_cases(&self) -> u32 {
        self.test_results.iter().filter(|r| r.passed).count() as u32
    }
}

/// Submission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Queued,
    Running,
    Passed,
    Failed,
    CompilationError,
}

impl SubmissionStatus {
    /// Get status as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::CompilationError => "compilation_error",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "compilation_error" => Some(Self::CompilationError),
            _ => None,
        }
    }

    /// Check if this is a final status (judging complete)
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running one test case, stored in submission order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_statuses() {
        assert!(!SubmissionStatus::Queued.is_final());
        assert!(!SubmissionStatus::Running.is_final());
        assert!(SubmissionStatus::Passed.is_final());
        assert!(SubmissionStatus::Failed.is_final());
        assert!(SubmissionStatus::CompilationError.is_final());
    }

    #[test]
    fn passed_cases_counts_only_passes() {
        let submission = Submission {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            exercise_id: "001-two-sum".to_string(),
            code: String::new(),
            language: Some("cpp".to_string()),
            status: "failed".to_string(),
            compilation_success: true,
            compilation_error: None,
            test_results: Json(vec![
                TestCaseResult {
                    test_case: "1".to_string(),
                    passed: true,
                    expected: "3".to_string(),
                    actual: "3".to_string(),
                    error: None,
                },
                TestCaseResult {
                    test_case: "2".to_string(),
                    passed: false,
                    expected: "5".to_string(),
                    actual: "4".to_string(),
                    error: None,
                },
            ]),
            submitted_at: Utc::now(),
        };
        assert_eq!(submission.passed_cases(), 1);
        assert!(submission.is_judged());
    }
}
