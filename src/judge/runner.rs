//! Judge runner
//!
//! Compiles a submission once, then runs the catalog's test cases in order,
//! stopping at the first failure. Output comparison normalizes line endings
//! and collapses whitespace runs.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    catalog::ExerciseCatalog,
    error::AppResult,
    models::TestCaseResult,
};

use super::sandbox::{CompileResult, ResourceLimits, RunFault, Sandbox};

/// The judge's verdict over one submission
#[derive(Debug, Clone)]
pub struct JudgeReport {
    /// All test cases passed
    pub success: bool,
    pub compilation_success: bool,
    pub compilation_error: Option<String>,
    /// Results in execution order; truncated at the first failure
    pub test_results: Vec<TestCaseResult>,
}

/// Runs one submission through the sandbox against its exercise
pub struct JudgeRunner {
    sandbox: Arc<dyn Sandbox>,
    catalog: ExerciseCatalog,
}

impl JudgeRunner {
    /// Create a new judge runner
    pub fn new(sandbox: Arc<dyn Sandbox>, catalog: ExerciseCatalog) -> Self {
        Self { sandbox, catalog }
    }

    /// Judge a submission against its exercise's hidden test cases
    pub async fn judge(
        &self,
        submission_id: Uuid,
        code: &str,
        exercise_id: &str,
    ) -> AppResult<JudgeReport> {
        // A missing or malformed config degrades to catalog defaults, the
        // same way a missing input file degrades to empty stdin.
        let config = match self.catalog.config(exercise_id).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(exercise_id, "using default limits: {}", e);
                Default::default()
            }
        };

        let limits = ResourceLimits {
            time_limit: config.time_limit(),
            memory_limit_mb: config.memory_limit_mb(),
        };

        let handle = match self.sandbox.compile(submission_id, code).await? {
            CompileResult::Success { handle } => handle,
            CompileResult::Failure { log } => {
                return Ok(JudgeReport {
                    success: false,
                    compilation_success: false,
                    compilation_error: Some(log),
                    test_results: Vec::new(),
                });
            }
        };

        let outcome = self.run_cases(&handle, exercise_id, limits).await;

        if let Err(e) = self.sandbox.cleanup(&handle).await {
            tracing::warn!(%submission_id, "sandbox cleanup failed: {}", e);
        }

        let test_results = outcome?;
        let success = test_results.iter().all(|r| r.passed);

        Ok(JudgeReport {
            success,
            compilation_success: true,
            compilation_error: None,
            test_results,
        })
    }

    async fn run_cases(
        &self,
        handle: &str,
        exercise_id: &str,
        limits: ResourceLimits,
    ) -> AppResult<Vec<TestCaseResult>> {
        let cases = self.catalog.test_cases(exercise_id).await?;
        let mut results = Vec::with_capacity(cases.len());

        for case in cases {
            let run = self.sandbox.run(handle, &case.input, limits).await?;

            let result = match run.fault {
                Some(RunFault::Timeout) => TestCaseResult {
                    test_case: case.id,
                    passed: false,
                    expected: String::new(),
                    actual: String::new(),
                    error: Some("Time limit exceeded".to_string()),
                },
                Some(RunFault::Crashed { exit_code }) => TestCaseResult {
                    test_case: case.id,
                    passed: false,
                    expected: String::new(),
                    actual: String::new(),
                    error: Some(format!(
                        "Runtime error (exit code {}): {}",
                        exit_code,
                        run.stderr.trim()
                    )),
                },
                None => {
                    let expected = normalize_output(&case.expected_output);
                    let actual = normalize_output(&run.stdout);
                    TestCaseResult {
                        test_case: case.id,
                        passed: expected == actual,
                        expected,
                        actual,
                        error: None,
                    }
                }
            };

            let passed = result.passed;
            results.push(result);

            // First failure decides the verdict; later cases never run.
            if !passed {
                break;
            }
        }

        Ok(results)
    }
}

/// Normalize line endings and collapse whitespace runs before comparison
pub fn normalize_output(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::super::sandbox::{MockSandbox, RunOutput};

    fn catalog_with_cases(cases: &[(&str, &str, &str)]) -> (TempDir, ExerciseCatalog) {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("001-sum");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.json"),
            r#"{"difficulty": "easy", "timeLimit": 2}"#,
        )
        .unwrap();
        for (stem, input, output) in cases {
            fs::write(dir.join(format!("{stem}.input.txt")), input).unwrap();
            fs::write(dir.join(format!("{stem}.output.txt")), output).unwrap();
        }
        let catalog = ExerciseCatalog::new(root.path());
        (root, catalog)
    }

    fn ok_run(stdout: &str) -> RunOutput {
        RunOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            fault: None,
        }
    }

    #[tokio::test]
    async fn stops_at_the_first_failing_case() {
        // 5 cases, case 2 fails: exactly 2 results come back and the
        // sandbox runs exactly twice
        let (_root, catalog) = catalog_with_cases(&[
            ("1", "1 2\n", "3\n"),
            ("2", "2 2\n", "4\n"),
            ("3", "3 3\n", "6\n"),
            ("4", "4 4\n", "8\n"),
            ("5", "5 5\n", "10\n"),
        ]);

        let mut sandbox = MockSandbox::new();
        sandbox.expect_compile().times(1).returning(|_, _| {
            Ok(CompileResult::Success {
                handle: "c1".to_string(),
            })
        });

        let mut run_count = 0;
        sandbox.expect_run().times(2).returning(move |_, _, _| {
            run_count += 1;
            if run_count == 1 {
                Ok(ok_run("3\n"))
            } else {
                Ok(ok_run("999\n"))
            }
        });
        sandbox.expect_cleanup().times(1).returning(|_| Ok(()));

        let runner = JudgeRunner::new(Arc::new(sandbox), catalog);
        let report = runner
            .judge(uuid::Uuid::new_v4(), "int main() {}", "001-sum")
            .await
            .unwrap();

        assert!(report.compilation_success);
        assert!(!report.success);
        assert_eq!(report.test_results.len(), 2);
        assert!(report.test_results[0].passed);
        assert!(!report.test_results[1].passed);
    }

    #[tokio::test]
    async fn full_pass_reports_success() {
        let (_root, catalog) = catalog_with_cases(&[("1", "1 2\n", "3\n"), ("2", "2 2\n", "4\n")]);

        let mut sandbox = MockSandbox::new();
        sandbox.expect_compile().times(1).returning(|_, _| {
            Ok(CompileResult::Success {
                handle: "c1".to_string(),
            })
        });

        let mut run_count = 0;
        sandbox.expect_run().times(2).returning(move |_, _, _| {
            run_count += 1;
            Ok(ok_run(if run_count == 1 { "3" } else { "4" }))
        });
        sandbox.expect_cleanup().times(1).returning(|_| Ok(()));

        let runner = JudgeRunner::new(Arc::new(sandbox), catalog);
        let report = runner
            .judge(uuid::Uuid::new_v4(), "int main() {}", "001-sum")
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.test_results.len(), 2);
    }

    #[tokio::test]
    async fn compile_failure_returns_no_test_results() {
        let (_root, catalog) = catalog_with_cases(&[("1", "1 2\n", "3\n")]);

        let mut sandbox = MockSandbox::new();
        sandbox.expect_compile().times(1).returning(|_, _| {
            Ok(CompileResult::Failure {
                log: "solution.cpp:1: error: expected ';'".to_string(),
            })
        });
        sandbox.expect_run().times(0);
        sandbox.expect_cleanup().times(0);

        let runner = JudgeRunner::new(Arc::new(sandbox), catalog);
        let report = runner
            .judge(uuid::Uuid::new_v4(), "int main() {", "001-sum")
            .await
            .unwrap();

        assert!(!report.success);
        assert!(!report.compilation_success);
        assert!(report.compilation_error.unwrap().contains("expected ';'"));
        assert!(report.test_results.is_empty());
    }

    #[tokio::test]
    async fn timeout_is_a_distinct_fault() {
        let (_root, catalog) = catalog_with_cases(&[("1", "1 2\n", "3\n")]);

        let mut sandbox = MockSandbox::new();
        sandbox.expect_compile().times(1).returning(|_, _| {
            Ok(CompileResult::Success {
                handle: "c1".to_string(),
            })
        });
        sandbox.expect_run().times(1).returning(|_, _, _| {
            Ok(RunOutput {
                stdout: String::new(),
                stderr: String::new(),
                fault: Some(RunFault::Timeout),
            })
        });
        sandbox.expect_cleanup().times(1).returning(|_| Ok(()));

        let runner = JudgeRunner::new(Arc::new(sandbox), catalog);
        let report = runner
            .judge(uuid::Uuid::new_v4(), "int main() { for(;;); }", "001-sum")
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(
            report.test_results[0].error.as_deref(),
            Some("Time limit exceeded")
        );
    }

    #[tokio::test]
    async fn limits_come_from_the_exercise_config() {
        let (_root, catalog) = catalog_with_cases(&[("1", "", "ok\n")]);

        let mut sandbox = MockSandbox::new();
        sandbox.expect_compile().times(1).returning(|_, _| {
            Ok(CompileResult::Success {
                handle: "c1".to_string(),
            })
        });
        sandbox
            .expect_run()
            .withf(|_, _, limits| limits.time_limit == Duration::from_secs(2))
            .times(1)
            .returning(|_, _, _| Ok(ok_run("ok")));
        sandbox.expect_cleanup().times(1).returning(|_| Ok(()));

        let runner = JudgeRunner::new(Arc::new(sandbox), catalog);
        let report = runner
            .judge(uuid::Uuid::new_v4(), "int main() {}", "001-sum")
            .await
            .unwrap();
        assert!(report.success);
    }

    #[test]
    fn normalization_collapses_whitespace_and_line_endings() {
        assert_eq!(normalize_output("1  2\t3\r\n4\r\n"), "1 2 3\n4");
        assert_eq!(normalize_output("  hello  \n"), "hello");
        assert_eq!(normalize_output("a\n\nb\n"), normalize_output("a\r\n\r\nb"));
    }
}
