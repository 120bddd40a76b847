use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MediaType;

/// Community-wide rating for a title, derived from every user's current score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRating {
    pub title_id: String,
    pub media_type: MediaType,
    pub sum_of_scores: f64,
    pub rating_count: i64,
    pub average_rating: f64,
    pub last_updated: DateTime<Utc>,
}

impl AggregateRating {
    pub fn from_totals(title_id: &str, media_type: MediaType, sum: f64, count: i64) -> Self {
        let average_rating = if count > 0 { sum / count as f64 } else { 0.0 };
        Self {
            title_id: title_id.to_string(),
            media_type,
            sum_of_scores: sum,
            rating_count: count,
            average_rating,
            last_updated: Utc::now(),
        }
    }
}

/// How one user's contribution to a title's aggregate changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub title_id: String,
    pub media_type: MediaType,
    pub old_score: Option<f64>,
    pub new_score: Option<f64>,
}

impl ScoreDelta {
    /// Change to apply to (sum, count)
    pub fn increments(&self) -> (f64, i64) {
        match (self.old_score, self.new_score) {
            (None, Some(new)) => (new, 1),
            (Some(old), None) => (-old, -1),
            (Some(old), Some(new)) => (new - old, 0),
            (None, None) => (0.0, 0),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.old_score == self.new_score
    }
}

/// Deltas produced by one repository mutation, merged per title
///
/// Recording the same title twice keeps the first old score and the last new
/// score, so a re-rank collapses into a single (old, new) pair.
#[derive(Debug, Clone, Default)]
pub struct DeltaSet {
    deltas: BTreeMap<String, ScoreDelta>,
}

impl DeltaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        title_id: &str,
        media_type: MediaType,
        old_score: Option<f64>,
        new_score: Option<f64>,
    ) {
        self.deltas
            .entry(title_id.to_string())
            .and_modify(|delta| {
                delta.new_score = new_score;
                delta.media_type = media_type;
            })
            .or_insert_with(|| ScoreDelta {
                title_id: title_id.to_string(),
                media_type,
                old_score,
                new_score,
            });
    }

    pub fn extend(&mut self, other: DeltaSet) {
        for delta in other.deltas.into_values() {
            self.record(
                &delta.title_id,
                delta.media_type,
                delta.old_score,
                delta.new_score,
            );
        }
    }

    /// Effective deltas, dropping titles whose score did not move
    pub fn into_deltas(self) -> Vec<ScoreDelta> {
        self.deltas
            .into_values()
            .filter(|delta| !delta.is_noop())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_cover_all_cases() {
        let delta = |old, new| ScoreDelta {
            title_id: "t".to_string(),
            media_type: MediaType::Movie,
            old_score: old,
            new_score: new,
        };
        assert_eq!(delta(None, Some(8.5)).increments(), (8.5, 1));
        assert_eq!(delta(Some(8.5), None).increments(), (-8.5, -1));
        assert_eq!(delta(Some(8.5), Some(10.0)).increments(), (1.5, 0));
        assert_eq!(delta(None, None).increments(), (0.0, 0));
    }

    #[test]
    fn test_delta_set_merges_rerank_into_one_pair() {
        let mut set = DeltaSet::new();
        set.record("a", MediaType::Movie, Some(10.0), None);
        set.record("a", MediaType::Movie, None, Some(5.5));

        let deltas = set.into_deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].old_score, Some(10.0));
        assert_eq!(deltas[0].new_score, Some(5.5));
    }

    #[test]
    fn test_delta_set_drops_unchanged_scores() {
        let mut set = DeltaSet::new();
        set.record("a", MediaType::Movie, Some(10.0), Some(10.0));
        set.record("b", MediaType::Series, Some(10.0), Some(8.5));

        let deltas = set.into_deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].title_id, "b");
    }

    #[test]
    fn test_from_totals_computes_average() {
        let rating = AggregateRating::from_totals("t", MediaType::Movie, 17.0, 2);
        assert_eq!(rating.average_rating, 8.5);

        let empty = AggregateRating::from_totals("t", MediaType::Movie, 0.0, 0);
        assert_eq!(empty.average_rating, 0.0);
    }
}
