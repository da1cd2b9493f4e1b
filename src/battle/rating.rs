//! Rating engine
//!
//! Bounded incremental rating updates: a logistic expectation, a
//! performance-based share split, and a K-factor modulated by streaks and
//! exercise difficulty. Draws never move ratings but do reset streaks.

use crate::constants::{
    BASE_K_FACTOR, LOSS_PENALTY_STEP, MAX_K_FACTOR, MAX_STREAK_BONUS, MIN_K_FACTOR,
    PERFORMANCE_CORRECTNESS_WEIGHT, PERFORMANCE_SPEED_WEIGHT, RATING_FLOOR, STREAK_BONUS_STEP,
};
use crate::matchmaking::Difficulty;
use crate::models::User;

/// The rating-relevant slice of a user row
#[derive(Debug, Clone, Copy)]
pub struct RatingProfile {
    pub rating: i32,
    pub win_streak: i32,
    pub loss_streak: i32,
    pub k_factor: i32,
    pub k_win: i32,
    pub k_lose: i32,
}

impl From<&User> for RatingProfile {
    fn from(user: &User) -> Self {
        Self {
            rating: user.rating,
            win_streak: user.win_streak,
            loss_streak: user.loss_streak,
            k_factor: user.k_factor,
            k_win: user.k_win,
            k_lose: user.k_lose,
        }
    }
}

/// A battle's result from one player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerResult {
    Win,
    Loss,
    Draw,
}

/// The new persistent rating state for one player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerUpdate {
    pub rating: i32,
    pub win_streak: i32,
    pub loss_streak: i32,
    pub k_factor: i32,
    pub delta: i32,
}

/// Blend of correctness and speed in [0, 1], used only to split the rating
/// share between the two players.
pub fn performance_score(
    passed_cases: u32,
    total_cases: u32,
    duration: chrono::Duration,
    cap: chrono::Duration,
) -> f64 {
    let correctness = if total_cases > 0 {
        passed_cases.min(total_cases) as f64 / total_cases as f64
    } else {
        0.0
    };

    let cap_ms = cap.num_milliseconds().max(1) as f64;
    let effective_ms = duration.num_milliseconds().clamp(0, cap.num_milliseconds()) as f64;
    let speed = (1.0 - effective_ms / cap_ms).clamp(0.0, 1.0);

    (PERFORMANCE_CORRECTNESS_WEIGHT * correctness + PERFORMANCE_SPEED_WEIGHT * speed)
        .clamp(0.0, 1.0)
}

/// Standard logistic expectation of beating `opponent_rating`
pub fn expected_score(own_rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_rating - own_rating) as f64 / 400.0))
}

/// Share of the rating pot, defaulting to an even split when neither player
/// performed at all.
pub fn rating_share(own_performance: f64, other_performance: f64) -> f64 {
    let total = own_performance + other_performance;
    if total > 0.0 {
        own_performance / total
    } else {
        0.5
    }
}

/// K-factor with streak and difficulty adjustments, clamped to [20, 50].
///
/// `solved` is the exercise difficulty when this player fully passed it,
/// `None` otherwise.
pub fn k_factor(
    rating: i32,
    win_streak: i32,
    loss_streak: i32,
    solved: Option<Difficulty>,
) -> f64 {
    let streak_bonus = ((win_streak.max(0) / 4) as f64 * STREAK_BONUS_STEP).min(MAX_STREAK_BONUS);
    let loss_penalty = (loss_streak.max(0) / 2) as f64 * LOSS_PENALTY_STEP;

    (BASE_K_FACTOR + streak_bonus - loss_penalty + difficulty_bonus(rating, solved))
        .clamp(MIN_K_FACTOR, MAX_K_FACTOR)
}

/// Rewards solving above one's level, penalizes farming below it. Flat zero
/// in the 350..=550 band and whenever the exercise was not solved.
fn difficulty_bonus(rating: i32, solved: Option<Difficulty>) -> f64 {
    let Some(difficulty) = solved else {
        return 0.0;
    };

    if rating < 350 {
        match difficulty {
            Difficulty::Medium => 5.0,
            Difficulty::Hard => 10.0,
            Difficulty::Easy => 0.0,
        }
    } else if rating > 550 {
        match difficulty {
            Difficulty::Easy => -5.0,
            Difficulty::Medium => -2.0,
            Difficulty::Hard => 0.0,
        }
    } else {
        0.0
    }
}

/// Full performance-weighted update for one player of a scored battle.
pub fn scored_update(
    profile: &RatingProfile,
    opponent_rating: i32,
    own_performance: f64,
    other_performance: f64,
    result: PlayerResult,
    solved: Option<Difficulty>,
) -> PlayerUpdate {
    if result == PlayerResult::Draw {
        return draw_update(profile);
    }

    let expected = expected_score(profile.rating, opponent_rating);
    let share = rating_share(own_performance, other_performance);
    let k = k_factor(profile.rating, profile.win_streak, profile.loss_streak, solved);

    finish_update(profile, k, share, expected, result)
}

/// Simplified resignation path: binary share against expectation with the
/// player's configured win/lose K constants.
pub fn resignation_update(
    profile: &RatingProfile,
    opponent_rating: i32,
    result: PlayerResult,
) -> PlayerUpdate {
    let expected = expected_score(profile.rating, opponent_rating);

    let (k, share) = match result {
        PlayerResult::Win => (profile.k_win as f64, 1.0),
        PlayerResult::Loss => (profile.k_lose as f64, 0.0),
        PlayerResult::Draw => return draw_update(profile),
    };

    finish_update(profile, k, share, expected, result)
}

fn draw_update(profile: &RatingProfile) -> PlayerUpdate {
    PlayerUpdate {
        rating: profile.rating,
        win_streak: 0,
        loss_streak: 0,
        k_factor: profile.k_factor,
        delta: 0,
    }
}

fn finish_update(
    profile: &RatingProfile,
    k: f64,
    share: f64,
    expected: f64,
    result: PlayerResult,
) -> PlayerUpdate {
    let mut delta = (k * (share - expected)).round() as i32;

    // Monotonic sign guarantee even when rounding lands on zero.
    let (win_streak, loss_streak) = match result {
        PlayerResult::Win => {
            delta = delta.max(1);
            (profile.win_streak + 1, 0)
        }
        PlayerResult::Loss => {
            delta = delta.min(-1);
            (0, profile.loss_streak + 1)
        }
        PlayerResult::Draw => unreachable!("draws are handled before delta computation"),
    };

    PlayerUpdate {
        rating: (profile.rating + delta).max(RATING_FLOOR),
        win_streak,
        loss_streak,
        k_factor: k.round() as i32,
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(rating: i32) -> RatingProfile {
        RatingProfile {
            rating,
            win_streak: 0,
            loss_streak: 0,
            k_factor: 40,
            k_win: 32,
            k_lose: 32,
        }
    }

    #[test]
    fn expectation_is_symmetric_and_rating_sensitive() {
        assert!((expected_score(400, 400) - 0.5).abs() < 1e-9);
        let strong = expected_score(600, 400);
        let weak = expected_score(400, 600);
        assert!(strong > 0.75);
        assert!((strong + weak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn performance_blends_correctness_and_speed() {
        let cap = chrono::Duration::seconds(120);

        // full pass, instant submission
        let instant = performance_score(5, 5, chrono::Duration::seconds(0), cap);
        assert!((instant - 1.0).abs() < 1e-9);

        // full pass at the cap keeps only the correctness term
        let slow = performance_score(5, 5, chrono::Duration::seconds(120), cap);
        assert!((slow - 0.8).abs() < 1e-9);

        // no submission at all scores zero
        let nothing = performance_score(0, 5, cap, cap);
        assert!(nothing.abs() < 1e-9);
    }

    #[test]
    fn durations_beyond_the_cap_are_clamped() {
        let cap = chrono::Duration::seconds(120);
        let over = performance_score(3, 5, chrono::Duration::seconds(600), cap);
        let at_cap = performance_score(3, 5, cap, cap);
        assert!((over - at_cap).abs() < 1e-9);
    }

    #[test]
    fn share_defaults_to_even_split_when_both_idle() {
        assert!((rating_share(0.0, 0.0) - 0.5).abs() < 1e-9);
        assert!((rating_share(0.6, 0.2) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn k_factor_clamps_and_respects_streaks() {
        // neutral player
        assert!((k_factor(400, 0, 0, None) - 40.0).abs() < 1e-9);
        // long win streak caps the bonus at +20, then the clamp at 50
        assert!((k_factor(400, 12, 0, None) - 50.0).abs() < 1e-9);
        // heavy loss streak clamps at the floor
        assert!((k_factor(400, 0, 10, None) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn difficulty_bonus_has_a_dead_zone() {
        // below 350 solving hard pays out
        assert!(k_factor(300, 0, 0, Some(Difficulty::Hard)) > k_factor(300, 0, 0, None));
        // above 550 solving easy is penalized
        assert!(
            k_factor(600, 0, 0, Some(Difficulty::Easy)) < k_factor(600, 0, 0, None)
        );
        // the 350..=550 band is flat regardless of what was solved
        assert!(
            (k_factor(450, 0, 0, Some(Difficulty::Hard)) - k_factor(450, 0, 0, None)).abs() < 1e-9
        );
        // unsolved exercises never move the K
        assert!((k_factor(300, 0, 0, None) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn winner_gains_at_least_one_loser_drops_at_least_one() {
        // ratings and performances so close the raw delta rounds to zero
        let winner = scored_update(&profile(400), 400, 0.500001, 0.5, PlayerResult::Win, None);
        let loser = scored_update(&profile(400), 400, 0.5, 0.500001, PlayerResult::Loss, None);
        assert!(winner.delta >= 1);
        assert!(loser.delta <= -1);
    }

    #[test]
    fn draw_changes_nothing_but_the_streaks() {
        let mut p = profile(437);
        p.win_streak = 5;
        p.loss_streak = 0;
        let update = scored_update(&p, 500, 0.4, 0.4, PlayerResult::Draw, None);
        assert_eq!(update.delta, 0);
        assert_eq!(update.rating, 437);
        assert_eq!(update.win_streak, 0);
        assert_eq!(update.loss_streak, 0);
    }

    #[test]
    fn rating_never_drops_below_the_floor() {
        let update = scored_update(&profile(201), 600, 0.0, 1.0, PlayerResult::Loss, None);
        assert_eq!(update.rating, 200);

        let resigned = resignation_update(&profile(200), 800, PlayerResult::Loss);
        assert_eq!(resigned.rating, 200);
    }

    #[test]
    fn streaks_update_on_decisive_results() {
        let mut p = profile(400);
        p.win_streak = 3;
        p.loss_streak = 0;
        let won = scored_update(&p, 400, 0.8, 0.2, PlayerResult::Win, None);
        assert_eq!(won.win_streak, 4);
        assert_eq!(won.loss_streak, 0);

        let mut q = profile(400);
        q.win_streak = 3;
        q.loss_streak = 0;
        let lost = scored_update(&q, 400, 0.2, 0.8, PlayerResult::Loss, None);
        assert_eq!(lost.win_streak, 0);
        assert_eq!(lost.loss_streak, 1);
    }

    #[test]
    fn resignation_uses_the_per_user_k_constants() {
        let mut winner = profile(400);
        winner.k_win = 16;
        let update = resignation_update(&winner, 400, PlayerResult::Win);
        // k_win * (1 - 0.5) = 8
        assert_eq!(update.delta, 8);
        assert_eq!(update.k_factor, 16);
        assert_eq!(update.win_streak, 1);

        let mut loser = profile(400);
        loser.k_lose = 16;
        let update = resignation_update(&loser, 400, PlayerResult::Loss);
        assert_eq!(update.delta, -8);
        assert_eq!(update.loss_streak, 1);
    }

    #[test]
    fn timeout_partial_scores_favor_the_higher_pass_count() {
        // scenario: 3/5 vs 1/5 at timeout, both rated 400
        let cap = chrono::Duration::seconds(120);
        let perf1 = performance_score(3, 5, chrono::Duration::seconds(60), cap);
        let perf2 = performance_score(1, 5, chrono::Duration::seconds(60), cap);

        let p1 = scored_update(&profile(400), 400, perf1, perf2, PlayerResult::Win, None);
        let p2 = scored_update(&profile(400), 400, perf2, perf1, PlayerResult::Loss, None);
        assert!(p1.delta >= 1);
        assert!(p2.delta <= -1);
        assert_eq!(p1.win_streak, 1);
        assert_eq!(p2.loss_streak, 1);
    }
}
