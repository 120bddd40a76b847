use serde::{Deserialize, Serialize};

use crate::models::SentimentTier;

pub const SCALE_MAX: f64 = 10.0;
pub const LIKED_FLOOR: f64 = 7.0;
pub const NEUTRAL_FLOOR: f64 = 4.0;
pub const DISLIKED_FLOOR: f64 = 0.0;

/// Whether a band's top may touch the floor of the band above it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TierBoundary {
    /// Neutral tops out at 7.0 and Disliked at 4.0
    #[default]
    Inclusive,
    /// Shared boundaries are excluded: tops sit `epsilon` below them
    Exclusive,
}

/// Maps a position inside a sentiment band onto the 0-10 scale
///
/// Each band owns a fixed slice of the scale: Disliked [0, 4), Neutral [4, 7),
/// Liked [7, 10]. Index 0 receives the band's top; lower positions are
/// linearly interpolated towards the floor using the band size as denominator,
/// so the floor itself is never reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreScale {
    boundary: TierBoundary,
    epsilon: f64,
}

impl Default for ScoreScale {
    fn default() -> Self {
        Self::new(TierBoundary::Inclusive, 0.1)
    }
}

impl ScoreScale {
    pub fn new(boundary: TierBoundary, epsilon: f64) -> Self {
        Self { boundary, epsilon }
    }

    pub fn boundary(&self) -> TierBoundary {
        self.boundary
    }

    /// (floor, top) for a tier under the configured boundary policy
    pub fn band(&self, tier: SentimentTier) -> (f64, f64) {
        let (floor, ceiling) = match tier {
            SentimentTier::Liked => (LIKED_FLOOR, SCALE_MAX),
            SentimentTier::Neutral => (NEUTRAL_FLOOR, LIKED_FLOOR),
            SentimentTier::Disliked => (DISLIKED_FLOOR, NEUTRAL_FLOOR),
        };

        // The scale maximum is not shared with any band, so it stays reachable.
        let top = match self.boundary {
            TierBoundary::Exclusive if ceiling < SCALE_MAX => ceiling - self.epsilon,
            _ => ceiling,
        };

        (floor, top)
    }

    pub fn score(&self, tier: SentimentTier, rank_index: usize, tier_size: usize) -> f64 {
        let (floor, top) = self.band(tier);
        let size = tier_size.max(rank_index + 1) as f64;
        top - (top - floor) * (rank_index as f64 / size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn both_policies() -> [ScoreScale; 2] {
        [
            ScoreScale::new(TierBoundary::Inclusive, 0.1),
            ScoreScale::new(TierBoundary::Exclusive, 0.1),
        ]
    }

    #[test]
    fn test_single_liked_entry_gets_top_of_scale() {
        for scale in both_policies() {
            assert!((scale.score(SentimentTier::Liked, 0, 1) - 10.0).abs() < EPS);
        }
    }

    #[test]
    fn test_two_liked_entries() {
        let scale = ScoreScale::default();
        assert!((scale.score(SentimentTier::Liked, 0, 2) - 10.0).abs() < EPS);
        assert!((scale.score(SentimentTier::Liked, 1, 2) - 8.5).abs() < EPS);
    }

    #[test]
    fn test_inclusive_boundaries_reach_band_ceilings() {
        let scale = ScoreScale::new(TierBoundary::Inclusive, 0.1);
        assert!((scale.score(SentimentTier::Neutral, 0, 3) - 7.0).abs() < EPS);
        assert!((scale.score(SentimentTier::Disliked, 0, 3) - 4.0).abs() < EPS);
    }

    #[test]
    fn test_exclusive_boundaries_stay_below_band_ceilings() {
        let scale = ScoreScale::new(TierBoundary::Exclusive, 0.1);
        let neutral_top = scale.score(SentimentTier::Neutral, 0, 1);
        let disliked_top = scale.score(SentimentTier::Disliked, 0, 1);
        assert!(neutral_top < 7.0);
        assert!(disliked_top < 4.0);
        assert!((neutral_top - 6.9).abs() < EPS);
        assert!((disliked_top - 3.9).abs() < EPS);
    }

    #[test]
    fn test_scores_strictly_decrease_within_tier() {
        for scale in both_policies() {
            for tier in SentimentTier::ALL {
                for size in 1..=25 {
                    let scores: Vec<f64> = (0..size).map(|i| scale.score(tier, i, size)).collect();
                    assert!(scores.windows(2).all(|w| w[0] > w[1]), "{tier} size {size}");
                    let (floor, top) = scale.band(tier);
                    assert!(scores.iter().all(|s| *s > floor && *s <= top));
                }
            }
        }
    }

    #[test]
    fn test_tiers_never_overlap_regardless_of_position() {
        for scale in both_policies() {
            for size in 1..=20 {
                let worst_liked = scale.score(SentimentTier::Liked, size - 1, size);
                let best_neutral = scale.score(SentimentTier::Neutral, 0, 1);
                let worst_neutral = scale.score(SentimentTier::Neutral, size - 1, size);
                let best_disliked = scale.score(SentimentTier::Disliked, 0, 1);
                assert!(worst_liked > best_neutral);
                assert!(worst_neutral > best_disliked);
            }
        }
    }

    #[test]
    fn test_scores_stay_within_scale() {
        let scale = ScoreScale::default();
        for size in 1..=50 {
            assert!(scale.score(SentimentTier::Disliked, size - 1, size) >= 0.0);
            assert!(scale.score(SentimentTier::Liked, 0, size) <= 10.0);
        }
    }

    #[test]
    fn test_out_of_range_index_is_clamped_to_band() {
        let scale = ScoreScale::default();
        let score = scale.score(SentimentTier::Neutral, 5, 2);
        assert!(score > NEUTRAL_FLOOR && score < LIKED_FLOOR);
    }
}
