//! Protected starter-code guard
//!
//! Exercises may mark line ranges of their starter template as editable;
//! everything outside the range must come back byte-identical (after
//! trimming) in a submission. Runs before a submission row is created or a
//! judge job enqueued.

/// Why a submission was rejected by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    /// The submission has fewer lines than the protected regions
    RemovedProtectedLines,
    /// A protected line differs from the template (1-based line number)
    ModifiedProtectedLine(usize),
}

impl std::fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemovedProtectedLines => write!(f, "You removed protected starter code."),
            Self::ModifiedProtectedLine(line) => {
                write!(f, "You modified protected line {}.", line)
            }
        }
    }
}

/// Verify the protected regions of `submitted` against the starter template.
///
/// `editable_start`/`editable_end` are 1-based inclusive line numbers into
/// the template; out-of-range or missing values widen the editable region to
/// the whole file on that side.
pub fn verify_protected_lines(
    starter: &str,
    submitted: &str,
    editable_start: Option<usize>,
    editable_end: Option<usize>,
) -> Result<(), GuardViolation> {
    let starter_lines: Vec<&str> = starter.split('\n').collect();
    let user_lines: Vec<&str> = submitted.split('\n').collect();

    let raw_start = editable_start.filter(|v| *v > 0).unwrap_or(1);
    let raw_end = editable_end.filter(|v| *v > 0).unwrap_or(starter_lines.len());

    let last_idx = starter_lines.len().saturating_sub(1);
    let start_idx = (raw_start - 1).min(last_idx);
    let end_idx = (raw_end - 1).min(last_idx).max(start_idx);

    let protected_top = start_idx;
    let protected_bottom = starter_lines.len().saturating_sub(end_idx + 1);

    if user_lines.len() < protected_top + protected_bottom {
        return Err(GuardViolation::RemovedProtectedLines);
    }

    for i in 0..protected_top {
        if starter_lines[i].trim() != user_lines[i].trim() {
            return Err(GuardViolation::ModifiedProtectedLine(i + 1));
        }
    }

    for i in 0..protected_bottom {
        let starter_idx = starter_lines.len() - protected_bottom + i;
        let user_idx = user_lines.len() - protected_bottom + i;
        if starter_lines[starter_idx].trim() != user_lines[user_idx].trim() {
            return Err(GuardViolation::ModifiedProtectedLine(starter_idx + 1));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTER: &str = "#include <iostream>\nint main() {\n    // TODO\n    return 0;\n}";

    #[test]
    fn untouched_protected_lines_pass() {
        let submitted = "#include <iostream>\nint main() {\n    std::cout << 42;\n    return 0;\n}";
        assert!(verify_protected_lines(STARTER, submitted, Some(3), Some(3)).is_ok());
    }

    #[test]
    fn whitespace_only_changes_are_tolerated() {
        let submitted =
            "#include <iostream>  \nint main() {\n    std::cout << 42;\n    return 0;\n}";
        assert!(verify_protected_lines(STARTER, submitted, Some(3), Some(3)).is_ok());
    }

    #[test]
    fn modified_top_line_is_reported_with_its_number() {
        let submitted = "#include <cstdio>\nint main() {\n    // TODO\n    return 0;\n}";
        assert_eq!(
            verify_protected_lines(STARTER, submitted, Some(3), Some(3)),
            Err(GuardViolation::ModifiedProtectedLine(1))
        );
    }

    #[test]
    fn modified_bottom_line_is_reported_with_its_number() {
        let submitted = "#include <iostream>\nint main() {\n    // TODO\n    return 1;\n}";
        assert_eq!(
            verify_protected_lines(STARTER, submitted, Some(3), Some(3)),
            Err(GuardViolation::ModifiedProtectedLine(4))
        );
    }

    #[test]
    fn deleting_protected_lines_is_rejected() {
        let submitted = "int main() { return 0; }";
        assert_eq!(
            verify_protected_lines(STARTER, submitted, Some(3), Some(3)),
            Err(GuardViolation::RemovedProtectedLines)
        );
    }

    #[test]
    fn missing_range_means_everything_editable() {
        let submitted = "completely different";
        assert!(verify_protected_lines(STARTER, submitted, None, None).is_ok());
    }

    #[test]
    fn extra_lines_inside_the_editable_region_pass() {
        let submitted =
            "#include <iostream>\nint main() {\n    int x = 1;\n    std::cout << x;\n    return 0;\n}";
        assert!(verify_protected_lines(STARTER, submitted, Some(3), Some(3)).is_ok());
    }
}
