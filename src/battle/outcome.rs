//! Outcome resolution
//!
//! Pure decision table over the judged evidence of both players and the
//! timeout flag. Evaluated in order; the first matching row wins. A `Defer`
//! decision leaves the battle active until more evidence or the timeout
//! arrives.

use chrono::{DateTime, Utc};

use crate::models::PlayerSlot;

/// Judged evidence for one player slot.
///
/// `submitted_at` is `None` until a judged submission exists; in-flight
/// (queued/running) submissions are not evidence yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerEvidence {
    pub submitted_at: Option<DateTime<Utc>>,
    pub passed_cases: u32,
    pub fully_passed: bool,
}

/// The resolved outcome of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Winner(PlayerSlot),
    Draw,
    Defer,
}

/// Resolve the battle given both players' evidence and whether the duration
/// cap has been reached.
pub fn resolve(player1: &PlayerEvidence, player2: &PlayerEvidence, timed_out: bool) -> Decision {
    match (player1.submitted_at, player2.submitted_at) {
        // Zero submissions: a timed-out battle is a draw, otherwise wait.
        (None, None) => {
            if timed_out {
                Decision::Draw
            } else {
                Decision::Defer
            }
        }

        // Both submitted.
        (Some(at1), Some(at2)) => {
            if !timed_out {
                match (player1.fully_passed, player2.fully_passed) {
                    (true, true) => earlier_of(at1, at2),
                    (true, false) => Decision::Winner(PlayerSlot::Player1),
                    (false, true) => Decision::Winner(PlayerSlot::Player2),
                    (false, false) => Decision::Defer,
                }
            } else if player1.passed_cases > player2.passed_cases {
                Decision::Winner(PlayerSlot::Player1)
            } else if player2.passed_cases > player1.passed_cases {
                Decision::Winner(PlayerSlot::Player2)
            } else if player1.passed_cases > 0 {
                earlier_of(at1, at2)
            } else {
                Decision::Draw
            }
        }

        // Exactly one submitted.
        (Some(_), None) => single_submitter(player1, PlayerSlot::Player1, timed_out),
        (None, Some(_)) => single_submitter(player2, PlayerSlot::Player2, timed_out),
    }
}

fn single_submitter(evidence: &PlayerEvidence, slot: PlayerSlot, timed_out: bool) -> Decision {
    if evidence.fully_passed {
        // A full pass from the only submitter wins regardless of timeout.
        Decision::Winner(slot)
    } else if !timed_out {
        Decision::Defer
    } else if evidence.passed_cases > 0 {
        Decision::Winner(slot)
    } else {
        Decision::Draw
    }
}

fn earlier_of(at1: DateTime<Utc>, at2: DateTime<Utc>) -> Decision {
    if at1 < at2 {
        Decision::Winner(PlayerSlot::Player1)
    } else if at2 < at1 {
        Decision::Winner(PlayerSlot::Player2)
    } else {
        // Exact timestamp tie resolves to a draw.
        Decision::Draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn evidence(submitted: Option<i64>, passed: u32, fully: bool) -> PlayerEvidence {
        PlayerEvidence {
            submitted_at: submitted.map(at),
            passed_cases: passed,
            fully_passed: fully,
        }
    }

    #[test]
    fn zero_submissions_draw_only_at_timeout() {
        let none = evidence(None, 0, false);
        assert_eq!(resolve(&none, &none, false), Decision::Defer);
        assert_eq!(resolve(&none, &none, true), Decision::Draw);
    }

    #[test]
    fn earliest_full_pass_wins_before_timeout() {
        let p1 = evidence(Some(30), 5, true);
        let p2 = evidence(Some(10), 5, true);
        assert_eq!(resolve(&p1, &p2, false), Decision::Winner(PlayerSlot::Player2));

        let partial = evidence(Some(5), 3, false);
        assert_eq!(resolve(&p1, &partial, false), Decision::Winner(PlayerSlot::Player1));
    }

    #[test]
    fn both_passed_identical_timestamp_is_draw() {
        // Exact-tie behavior preserved from the source implementation.
        let p1 = evidence(Some(30), 5, true);
        let p2 = evidence(Some(30), 5, true);
        assert_eq!(resolve(&p1, &p2, false), Decision::Draw);
    }

    #[test]
    fn both_partial_before_timeout_defers() {
        let p1 = evidence(Some(30), 3, false);
        let p2 = evidence(Some(40), 1, false);
        assert_eq!(resolve(&p1, &p2, false), Decision::Defer);
    }

    #[test]
    fn timeout_compares_passed_counts() {
        // 3 vs 1 passed cases out of 5, no full pass: player1 wins
        let p1 = evidence(Some(30), 3, false);
        let p2 = evidence(Some(20), 1, false);
        assert_eq!(resolve(&p1, &p2, true), Decision::Winner(PlayerSlot::Player1));
    }

    #[test]
    fn timeout_with_equal_nonzero_counts_rewards_the_earlier_submission() {
        let p1 = evidence(Some(30), 2, false);
        let p2 = evidence(Some(20), 2, false);
        assert_eq!(resolve(&p1, &p2, true), Decision::Winner(PlayerSlot::Player2));
    }

    #[test]
    fn timeout_with_both_zero_counts_is_a_draw() {
        let p1 = evidence(Some(30), 0, false);
        let p2 = evidence(Some(20), 0, false);
        assert_eq!(resolve(&p1, &p2, true), Decision::Draw);
    }

    #[test]
    fn lone_full_pass_wins_even_after_timeout() {
        let p1 = evidence(Some(30), 5, true);
        let none = evidence(None, 0, false);
        assert_eq!(resolve(&p1, &none, false), Decision::Winner(PlayerSlot::Player1));
        assert_eq!(resolve(&p1, &none, true), Decision::Winner(PlayerSlot::Player1));
        assert_eq!(resolve(&none, &p1, true), Decision::Winner(PlayerSlot::Player2));
    }

    #[test]
    fn lone_partial_submission_defers_until_timeout() {
        let p1 = evidence(Some(30), 2, false);
        let none = evidence(None, 0, false);
        assert_eq!(resolve(&p1, &none, false), Decision::Defer);
        assert_eq!(resolve(&p1, &none, true), Decision::Winner(PlayerSlot::Player1));
    }

    #[test]
    fn lone_zero_score_submission_draws_at_timeout() {
        let p1 = evidence(Some(30), 0, false);
        let none = evidence(None, 0, false);
        assert_eq!(resolve(&p1, &none, true), Decision::Draw);
    }
}
