use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{AggregateRating, ScoreDelta},
    services::retry::{with_retry, RetryConfig},
    store::{AggregateStore, RankingStore},
};

/// Maintains each title's community sum, count and average
///
/// Incremental updates are additive, so concurrent contributors for the same
/// title commute. `recompute` rebuilds a title's totals from every user's
/// current entries and is the repair path for any drift.
pub struct AggregateRatingService {
    store: Arc<dyn AggregateStore>,
    rankings: Arc<dyn RankingStore>,
    retry: RetryConfig,
}

impl AggregateRatingService {
    pub fn new(
        store: Arc<dyn AggregateStore>,
        rankings: Arc<dyn RankingStore>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            rankings,
            retry,
        }
    }

    pub async fn get(&self, title_id: &str) -> AppResult<Option<AggregateRating>> {
        self.store.get(title_id).await
    }

    /// Applies one contributor's (old, new) score change
    pub async fn apply_delta(&self, delta: &ScoreDelta) -> AppResult<Option<AggregateRating>> {
        let (sum_delta, count_delta) = delta.increments();
        if sum_delta == 0.0 && count_delta == 0 {
            return self.store.get(&delta.title_id).await;
        }

        let store = &self.store;
        let title_id = delta.title_id.as_str();
        let media_type = delta.media_type;

        let updated = with_retry(&self.retry, "aggregate.apply_delta", move || {
            store.increment(title_id, media_type, sum_delta, count_delta)
        })
        .await?;

        tracing::debug!(
            title_id = %title_id,
            old_score = ?delta.old_score,
            new_score = ?delta.new_score,
            rating_count = updated.as_ref().map(|a| a.rating_count),
            "Aggregate delta applied"
        );

        Ok(updated)
    }

    /// Applies every delta independently
    ///
    /// A delta that still fails after retries triggers a recompute of its
    /// title. If that also fails, the first error is returned once every other
    /// delta has been attempted.
    pub async fn apply_deltas(&self, deltas: &[ScoreDelta]) -> AppResult<()> {
        let mut first_error = None;

        for delta in deltas {
            let Err(e) = self.apply_delta(delta).await else {
                continue;
            };

            tracing::warn!(
                title_id = %delta.title_id,
                error = %e,
                "Aggregate delta failed, recomputing title"
            );

            if let Err(repair_error) = self.recompute(&delta.title_id).await {
                tracing::error!(
                    title_id = %delta.title_id,
                    error = %repair_error,
                    "Aggregate repair failed"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Rebuilds a title's totals from all users' current scores
    ///
    /// Writes absolute values, so running it repeatedly converges on the same
    /// row. The row is deleted when nobody holds the title any more.
    pub async fn recompute(&self, title_id: &str) -> AppResult<Option<AggregateRating>> {
        let mut scores = self.rankings.title_scores(title_id).await?;

        let Some(&(media_type, _)) = scores.first() else {
            let removed = self.store.delete(title_id).await?;
            tracing::info!(title_id = %title_id, removed, "Aggregate recomputed: no ratings");
            return Ok(None);
        };

        // Fixed summation order keeps repeated runs bit-identical
        scores.sort_by(|a, b| a.1.total_cmp(&b.1));
        let sum: f64 = scores.iter().map(|(_, score)| score).sum();
        let count = scores.len() as i64;

        let store = &self.store;
        let rating = with_retry(&self.retry, "aggregate.recompute", move || {
            store.replace(title_id, media_type, sum, count)
        })
        .await?;

        tracing::info!(
            title_id = %title_id,
            sum_of_scores = sum,
            rating_count = count,
            "Aggregate recomputed"
        );

        Ok(rating)
    }
}
