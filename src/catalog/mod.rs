//! Exercise catalog reader
//!
//! Exercises live on disk, one directory per exercise: a `config.json` with
//! the difficulty tag, limits and starter-code metadata, and ordered
//! `N.input.txt` / `N.output.txt` test-case pairs. Content faults degrade to
//! "exercise unavailable" instead of failing the worker.

pub mod guard;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::{
    constants::{DEFAULT_MEMORY_LIMIT_MB, DEFAULT_TIME_LIMIT_SECONDS},
    error::{AppError, AppResult},
    matchmaking::Difficulty,
};

/// Per-exercise configuration parsed from `config.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseConfig {
    #[serde(default)]
    pub difficulty: String,
    /// Per-test-case time limit in seconds
    #[serde(rename = "timeLimit")]
    pub time_limit: Option<u64>,
    /// Memory limit, e.g. "256m"
    #[serde(rename = "memoryLimit")]
    pub memory_limit: Option<String>,
    /// File name of the starter-code template, relative to the exercise dir
    #[serde(rename = "starterCode")]
    pub starter_code: Option<String>,
    /// First editable line of the starter template (1-based, inclusive)
    pub editable_start: Option<usize>,
    /// Last editable line of the starter template (1-based, inclusive)
    pub editable_end: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ExerciseConfig {
    /// Parsed difficulty tag
    pub fn difficulty_tag(&self) -> Option<Difficulty> {
        Difficulty::from_str(&self.difficulty)
    }

    /// Time limit with the catalog default applied
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_SECONDS))
    }

    /// Memory limit in megabytes, parsing suffixes like "256m" / "1g"
    pub fn memory_limit_mb(&self) -> u64 {
        let Some(raw) = self.memory_limit.as_deref() else {
            return DEFAULT_MEMORY_LIMIT_MB;
        };

        let raw = raw.trim().to_ascii_lowercase();
        let (digits, multiplier) = match raw.strip_suffix('g') {
            Some(d) => (d, 1024),
            None => (raw.strip_suffix('m').unwrap_or(&raw), 1),
        };

        digits
            .parse::<u64>()
            .map(|v| v * multiplier)
            .unwrap_or(DEFAULT_MEMORY_LIMIT_MB)
    }
}

/// One (input, expected output) pair
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: String,
    pub input: String,
    pub expected_output: String,
}

/// Filesystem-backed exercise catalog
#[derive(Debug, Clone)]
pub struct ExerciseCatalog {
    root: PathBuf,
}

impl ExerciseCatalog {
    /// Create a catalog rooted at the exercises directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load one exercise's configuration
    pub async fn config(&self, exercise_id: &str) -> AppResult<ExerciseConfig> {
        let path = self.root.join(exercise_id).join("config.json");

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!("malformed config {}: {}", path.display(), e))
        })
    }

    /// Ordered test cases for one exercise.
    ///
    /// A case exists per `N.output.txt`; a missing `N.input.txt` means empty
    /// stdin.
    pub async fn test_cases(&self, exercise_id: &str) -> AppResult<Vec<TestCase>> {
        let dir = self.root.join(exercise_id);
        let mut stems = self.case_stems(exercise_id).await?;
        stems.sort();

        let mut cases = Vec::with_capacity(stems.len());
        for stem in stems {
            let expected_output = tokio::fs::read_to_string(dir.join(format!("{stem}.output.txt")))
                .await
                .map_err(|e| {
                    AppError::Configuration(format!(
                        "cannot read test case {stem} of {exercise_id}: {e}"
                    ))
                })?;

            let input = tokio::fs::read_to_string(dir.join(format!("{stem}.input.txt")))
                .await
                .unwrap_or_default();

            cases.push(TestCase {
                id: stem,
                input,
                expected_output,
            });
        }

        Ok(cases)
    }

    /// Number of test cases without reading their contents
    pub async fn test_case_count(&self, exercise_id: &str) -> AppResult<usize> {
        Ok(self.case_stems(exercise_id).await?.len())
    }

    /// The starter-code template, when the exercise declares one
    pub async fn starter_code(
        &self,
        exercise_id: &str,
        config: &ExerciseConfig,
    ) -> AppResult<Option<String>> {
        let Some(file) = config.starter_code.as_deref() else {
            return Ok(None);
        };

        let path = self.root.join(exercise_id).join(file);
        let code = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;

        Ok(Some(code))
    }

    /// All exercise ids carrying the given difficulty tag.
    ///
    /// Unreadable or malformed exercises are skipped with a log line, never
    /// propagated.
    pub async fn list_by_difficulty(&self, difficulty: Difficulty) -> Vec<String> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("cannot read exercise catalog {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut matches = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("error scanning exercise catalog: {}", e);
                    break;
                }
            };

            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            let exercise_id = entry.file_name().to_string_lossy().to_string();
            match self.config(&exercise_id).await {
                Ok(config) if config.difficulty_tag() == Some(difficulty) => {
                    matches.push(exercise_id);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("skipping exercise {}: {}", exercise_id, e);
                }
            }
        }

        matches
    }

    async fn case_stems(&self, exercise_id: &str) -> AppResult<Vec<String>> {
        let dir = self.root.join(exercise_id);
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            AppError::Configuration(format!("cannot read exercise {}: {}", dir.display(), e))
        })?;

        let mut stems = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            AppError::Configuration(format!("error scanning exercise {exercise_id}: {e}"))
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(".output.txt") {
                stems.push(stem.to_string());
            }
        }

        Ok(stems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use tempfile::TempDir;

    fn write_exercise(root: &TempDir, id: &str, difficulty: &str, cases: &[(&str, &str)]) {
        let dir = root.path().join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.json"),
            format!(r#"{{"difficulty": "{difficulty}", "timeLimit": 3}}"#),
        )
        .unwrap();
        for (stem, output) in cases {
            fs::write(dir.join(format!("{stem}.input.txt")), "1 2\n").unwrap();
            fs::write(dir.join(format!("{stem}.output.txt")), output).unwrap();
        }
    }

    #[tokio::test]
    async fn reads_config_and_ordered_cases() {
        let root = TempDir::new().unwrap();
        write_exercise(&root, "001-sum", "easy", &[("2", "5\n"), ("1", "3\n")]);

        let catalog = ExerciseCatalog::new(root.path());
        let config = catalog.config("001-sum").await.unwrap();
        assert_eq!(config.difficulty_tag(), Some(Difficulty::Easy));
        assert_eq!(config.time_limit(), Duration::from_secs(3));

        let cases = catalog.test_cases("001-sum").await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "1");
        assert_eq!(cases[1].id, "2");
        assert_eq!(cases[0].expected_output, "3\n");
    }

    #[tokio::test]
    async fn malformed_config_is_skipped_in_listing() {
        let root = TempDir::new().unwrap();
        write_exercise(&root, "001-sum", "easy", &[("1", "3\n")]);
        write_exercise(&root, "002-max", "medium", &[("1", "9\n")]);

        let broken = root.path().join("003-broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("config.json"), "{ not json").unwrap();

        let catalog = ExerciseCatalog::new(root.path());
        let easy = catalog.list_by_difficulty(Difficulty::Easy).await;
        assert_eq!(easy, vec!["001-sum".to_string()]);

        let hard = catalog.list_by_difficulty(Difficulty::Hard).await;
        assert!(hard.is_empty());
    }

    #[tokio::test]
    async fn missing_input_file_means_empty_stdin() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("004-const");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), r#"{"difficulty": "easy"}"#).unwrap();
        fs::write(dir.join("1.output.txt"), "42\n").unwrap();

        let catalog = ExerciseCatalog::new(root.path());
        let cases = catalog.test_cases("004-const").await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, "");
    }

    #[test]
    fn memory_limit_parses_suffixes() {
        let mut config = ExerciseConfig::default();
        assert_eq!(config.memory_limit_mb(), DEFAULT_MEMORY_LIMIT_MB);

        config.memory_limit = Some("512m".to_string());
        assert_eq!(config.memory_limit_mb(), 512);

        config.memory_limit = Some("1g".to_string());
        assert_eq!(config.memory_limit_mb(), 1024);

        config.memory_limit = Some("garbage".to_string());
        assert_eq!(config.memory_limit_mb(), DEFAULT_MEMORY_LIMIT_MB);
    }
}
