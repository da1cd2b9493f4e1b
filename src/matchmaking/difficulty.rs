//! Difficulty buckets and rating tolerance
//!
//! Exercise difficulty is drawn from a rating-keyed bucket table, and the
//! allowed rating gap between two queued players widens with wait time.

use serde::{Deserialize, Serialize};

use crate::constants::{TOLERANCE_BASE, TOLERANCE_CAP, TOLERANCE_PER_MINUTE};

/// Exercise difficulty tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Get difficulty as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Parse difficulty from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the rating-bucket table
#[derive(Debug, Clone, Copy)]
pub struct DifficultyBucket {
    /// Exclusive upper rating bound
    pub max_rating: f64,
    pub label: &'static str,
    pub weights: &'static [(Difficulty, f64)],
}

/// Rating thresholds are exclusive upper bounds; the last bucket catches
/// everything.
pub const BUCKETS: &[DifficultyBucket] = &[
    DifficultyBucket {
        max_rating: 350.0,
        label: "Easy",
        weights: &[(Difficulty::Easy, 1.0)],
    },
    DifficultyBucket {
        max_rating: 450.0,
        label: "Balanced (Easy/Medium)",
        weights: &[(Difficulty::Easy, 0.5), (Difficulty::Medium, 0.5)],
    },
    DifficultyBucket {
        max_rating: 550.0,
        label: "Balanced (Medium/Hard)",
        weights: &[(Difficulty::Medium, 0.5), (Difficulty::Hard, 0.5)],
    },
    DifficultyBucket {
        max_rating: f64::INFINITY,
        label: "Hard",
        weights: &[(Difficulty::Hard, 1.0)],
    },
];

/// The bucket a rating falls into
pub fn bucket_for(rating: f64) -> &'static DifficultyBucket {
    BUCKETS
        .iter()
        .find(|bucket| rating < bucket.max_rating)
        .unwrap_or(&BUCKETS[BUCKETS.len() - 1])
}

/// Weighted draw of a primary difficulty; `roll` is uniform in [0, 1).
///
/// The roll is scaled by the bucket's total weight and walked through the
/// cumulative weights until it lands.
pub fn pick_difficulty(rating: f64, roll: f64) -> Difficulty {
    let bucket = bucket_for(rating);

    let total: f64 = bucket.weights.iter().map(|(_, w)| w).sum();
    let scaled = roll.clamp(0.0, 1.0) * if total > 0.0 { total } else { 1.0 };

    let mut cumulative = 0.0;
    for (difficulty, weight) in bucket.weights {
        cumulative += weight;
        if scaled <= cumulative {
            return *difficulty;
        }
    }

    Difficulty::Medium
}

/// Weighted draw using the thread-local RNG
pub fn pick_difficulty_random(rating: f64) -> Difficulty {
    let roll: f64 = rand::Rng::random_range(&mut rand::rng(), 0.0..1.0);
    pick_difficulty(rating, roll)
}

/// The ordered difficulty fallback chain for exercise selection: the primary
/// draw, then the bucket's difficulties by descending weight, then all three
/// tags, deduplicated.
pub fn fallback_difficulties(rating: f64, primary: Difficulty) -> Vec<Difficulty> {
    let bucket = bucket_for(rating);

    let mut by_weight: Vec<(Difficulty, f64)> = bucket.weights.to_vec();
    by_weight.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut chain = vec![primary];
    chain.extend(by_weight.into_iter().map(|(d, _)| d));
    chain.extend([Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]);

    let mut seen = Vec::new();
    chain.retain(|d| {
        if seen.contains(d) {
            false
        } else {
            seen.push(*d);
            true
        }
    });

    chain
}

/// Allowed rating gap after waiting `waited_ms`: widens by 100 per full
/// minute from a base of 100, capped at 400.
pub fn max_rating_difference(waited_ms: i64) -> i64 {
    let minutes = waited_ms.max(0) / 60_000;
    (TOLERANCE_BASE + minutes * TOLERANCE_PER_MINUTE).min(TOLERANCE_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_follow_the_rating_thresholds() {
        assert_eq!(bucket_for(200.0).label, "Easy");
        assert_eq!(bucket_for(349.9).label, "Easy");
        assert_eq!(bucket_for(350.0).label, "Balanced (Easy/Medium)");
        assert_eq!(bucket_for(410.0).label, "Balanced (Easy/Medium)");
        assert_eq!(bucket_for(450.0).label, "Balanced (Medium/Hard)");
        assert_eq!(bucket_for(550.0).label, "Hard");
        assert_eq!(bucket_for(900.0).label, "Hard");
    }

    #[test]
    fn weighted_draw_splits_balanced_buckets() {
        // avg rating 410 sits in the Easy/Medium bucket: low rolls draw
        // easy, high rolls draw medium
        assert_eq!(pick_difficulty(410.0, 0.0), Difficulty::Easy);
        assert_eq!(pick_difficulty(410.0, 0.49), Difficulty::Easy);
        assert_eq!(pick_difficulty(410.0, 0.51), Difficulty::Medium);
        assert_eq!(pick_difficulty(410.0, 0.99), Difficulty::Medium);
    }

    #[test]
    fn single_weight_buckets_always_draw_their_tag() {
        for roll in [0.0, 0.3, 0.99] {
            assert_eq!(pick_difficulty(300.0, roll), Difficulty::Easy);
            assert_eq!(pick_difficulty(700.0, roll), Difficulty::Hard);
        }
    }

    #[test]
    fn fallback_chain_dedupes_and_covers_all_tags() {
        let chain = fallback_difficulties(410.0, Difficulty::Medium);
        assert_eq!(chain.first(), Some(&Difficulty::Medium));
        assert_eq!(chain.len(), 3);
        assert!(chain.contains(&Difficulty::Easy));
        assert!(chain.contains(&Difficulty::Hard));
    }

    #[test]
    fn tolerance_widens_per_minute_and_caps() {
        assert_eq!(max_rating_difference(0), 100);
        assert_eq!(max_rating_difference(59_999), 100);
        assert_eq!(max_rating_difference(60_000), 200);
        assert_eq!(max_rating_difference(3 * 60_000), 400);
        assert_eq!(max_rating_difference(60 * 60_000), 400);
    }

    #[test]
    fn close_ratings_are_within_initial_tolerance() {
        // users at 400 and 420 are pairable in the first cycle
        assert!((420i64 - 400i64).abs() <= max_rating_difference(0));
        // a 150-point gap needs a minute of waiting
        assert!((550i64 - 400i64).abs() > max_rating_difference(0));
        assert!((550i64 - 400i64).abs() <= max_rating_difference(60_000));
    }
}
