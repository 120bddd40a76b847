use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{AggregateRating, Candidate, RankedEntry, RatingEvent, ScoreDelta, SentimentTier},
    services::{
        aggregate::AggregateRatingService,
        collaborators::{AccountFinalizer, RatingEventSink},
        comparison::{
            ComparisonAnswer, ComparisonRequest, ComparisonSession, NextStep, Placement,
            SnapshotEntry,
        },
    },
    store::{RankingStore, SessionStore},
};

/// What the caller sees after starting, answering or inspecting a ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RankingStep {
    /// Another comparison is needed
    Compare { prompt: ComparisonRequest },
    /// The search finished but the entry is not persisted yet
    Resolved { session_id: Uuid, placement: Placement },
    Committed {
        entry: RankedEntry,
        comparisons: usize,
        tied_with: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDeletion {
    pub user_id: String,
    pub removed_titles: usize,
}

/// Drives the ranking flow end to end
///
/// Owns no state of its own: entries live in the [`RankingStore`], open
/// sessions in the [`SessionStore`], and community totals behind the
/// [`AggregateRatingService`].
pub struct RankingService {
    rankings: Arc<dyn RankingStore>,
    sessions: Arc<dyn SessionStore>,
    aggregates: Arc<AggregateRatingService>,
    events: Arc<dyn RatingEventSink>,
    finalizer: Arc<dyn AccountFinalizer>,
}

impl RankingService {
    pub fn new(
        rankings: Arc<dyn RankingStore>,
        sessions: Arc<dyn SessionStore>,
        aggregates: Arc<AggregateRatingService>,
        events: Arc<dyn RatingEventSink>,
        finalizer: Arc<dyn AccountFinalizer>,
    ) -> Self {
        Self {
            rankings,
            sessions,
            aggregates,
            events,
            finalizer,
        }
    }

    /// Opens a comparison session for `candidate` in `tier`
    ///
    /// Ranking into an empty tier (or a tier holding only the candidate itself)
    /// commits straight away without opening a session.
    pub async fn start_ranking(
        &self,
        user_id: &str,
        candidate: Candidate,
        tier: SentimentTier,
    ) -> AppResult<RankingStep> {
        require_id("user_id", user_id)?;
        require_id("title_id", &candidate.title_id)?;

        if self.sessions.get(user_id).await?.is_some() {
            return Err(AppError::SessionConflict {
                user_id: user_id.to_string(),
            });
        }

        // Re-ranking a held title compares it against the rest of the tier only
        let snapshot: Vec<SnapshotEntry> = self
            .rankings
            .tier_entries(user_id, tier)
            .await?
            .iter()
            .filter(|entry| entry.title_id != candidate.title_id)
            .enumerate()
            .map(|(position, entry)| SnapshotEntry {
                rank_index: position,
                ..SnapshotEntry::from(entry)
            })
            .collect();

        let session = ComparisonSession::begin(user_id, candidate, tier, snapshot);

        match session.next_prompt() {
            NextStep::Done(_) => self.commit_session(session, false).await,
            NextStep::Prompt(prompt) => {
                self.sessions.create(&session).await?;
                tracing::info!(
                    session_id = %session.id,
                    user_id = %user_id,
                    title_id = %session.candidate.title_id,
                    tier = %tier,
                    max_remaining = prompt.max_remaining,
                    "Comparison session opened"
                );
                Ok(RankingStep::Compare { prompt })
            }
        }
    }

    /// Applies an answer to the user's pending prompt
    pub async fn answer(&self, user_id: &str, answer: &str) -> AppResult<RankingStep> {
        let answer: ComparisonAnswer = answer.parse()?;
        let mut session = self.open_session(user_id).await?;

        let step = session.resolve(answer)?;
        self.sessions.save(&session).await?;

        match step {
            NextStep::Prompt(prompt) => Ok(RankingStep::Compare { prompt }),
            NextStep::Done(_) => self.commit_session(session, true).await,
        }
    }

    pub async fn current_prompt(&self, user_id: &str) -> AppResult<RankingStep> {
        let session = self.open_session(user_id).await?;

        Ok(match session.next_prompt() {
            NextStep::Prompt(prompt) => RankingStep::Compare { prompt },
            NextStep::Done(placement) => RankingStep::Resolved {
                session_id: session.id,
                placement,
            },
        })
    }

    /// Discards the user's open session without touching their rankings
    pub async fn cancel(&self, user_id: &str) -> AppResult<()> {
        if !self.sessions.remove(user_id).await? {
            return Err(AppError::NoActiveSession(user_id.to_string()));
        }
        tracing::info!(user_id = %user_id, "Comparison session cancelled");
        Ok(())
    }

    /// Persists a resolved session whose earlier commit failed
    pub async fn commit(&self, user_id: &str) -> AppResult<RankingStep> {
        let session = self.open_session(user_id).await?;
        self.commit_session(session, true).await
    }

    pub async fn delete_entry(&self, user_id: &str, title_id: &str) -> AppResult<RankedEntry> {
        let entry = self
            .rankings
            .find_entry(user_id, title_id)
            .await?
            .ok_or_else(|| AppError::EntryNotFound {
                user_id: user_id.to_string(),
                title_id: title_id.to_string(),
            })?;

        let mutation = self.rankings.remove(user_id, entry.tier, title_id).await?;

        tracing::info!(
            user_id = %user_id,
            title_id = %title_id,
            tier = %entry.tier,
            remaining = mutation.tier_entries.len(),
            "Ranked entry deleted"
        );

        self.apply_deltas(&mutation.deltas).await;
        self.publish(RatingEvent::Removed {
            user_id: user_id.to_string(),
            title_id: title_id.to_string(),
        })
        .await;

        Ok(entry)
    }

    /// Removes everything the user has ranked, then hands off to the account
    /// service
    ///
    /// Safe to repeat: a second call finds nothing left and only finalizes.
    pub async fn delete_account(&self, user_id: &str) -> AppResult<AccountDeletion> {
        require_id("user_id", user_id)?;

        if self.sessions.remove(user_id).await? {
            tracing::debug!(user_id = %user_id, "Open session dropped with account");
        }

        let deltas = self.rankings.remove_all_for_user(user_id).await?;
        let removed_titles = deltas.iter().filter(|d| d.old_score.is_some()).count();
        self.apply_deltas(&deltas).await;

        if let Err(e) = self.finalizer.finalize_account_removal(user_id).await {
            tracing::error!(user_id = %user_id, error = %e, "Account finalization failed");
        }

        tracing::info!(user_id = %user_id, removed_titles, "Account rankings deleted");

        Ok(AccountDeletion {
            user_id: user_id.to_string(),
            removed_titles,
        })
    }

    pub async fn recompute_aggregate(&self, title_id: &str) -> AppResult<Option<AggregateRating>> {
        self.aggregates.recompute(title_id).await
    }

    pub async fn aggregate(&self, title_id: &str) -> AppResult<AggregateRating> {
        self.aggregates
            .get(title_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no ratings for title {}", title_id)))
    }

    /// The user's entries in rank order, best tier first
    pub async fn rankings(
        &self,
        user_id: &str,
        tier: Option<SentimentTier>,
    ) -> AppResult<Vec<RankedEntry>> {
        match tier {
            Some(tier) => self.rankings.tier_entries(user_id, tier).await,
            None => self.rankings.user_entries(user_id).await,
        }
    }

    async fn open_session(&self, user_id: &str) -> AppResult<ComparisonSession> {
        self.sessions
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NoActiveSession(user_id.to_string()))
    }

    /// Writes the resolved placement, then settles aggregates and events
    ///
    /// A stored session is only removed once the entry is persisted, so a
    /// failed write can be retried through [`RankingService::commit`].
    async fn commit_session(&self, session: ComparisonSession, stored: bool) -> AppResult<RankingStep> {
        let user_id = session.user_id.clone();
        let plan = session.commit()?;

        let entry = RankedEntry::new(&user_id, &plan.candidate, plan.tier);
        let mutation = match self.rankings.insert(&user_id, plan.tier, plan.index, entry).await {
            Ok(mutation) => mutation,
            Err(e) => {
                tracing::error!(
                    session_id = %plan.session_id,
                    user_id = %user_id,
                    error = %e,
                    "Commit failed, session kept for retry"
                );
                return Err(e);
            }
        };

        let entry = mutation.entry.ok_or_else(|| {
            AppError::Internal(format!(
                "title {} missing from tier {} after insert",
                plan.candidate.title_id, plan.tier
            ))
        })?;

        if mutation.tier_entries.len() != plan.snapshot_len + 1 {
            tracing::warn!(
                user_id = %user_id,
                tier = %plan.tier,
                snapshot_len = plan.snapshot_len,
                current_len = mutation.tier_entries.len(),
                "Tier changed while the session was open"
            );
        }

        if stored {
            if let Err(e) = self.sessions.remove(&user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to clear committed session");
            }
        }

        tracing::info!(
            session_id = %plan.session_id,
            user_id = %user_id,
            title_id = %entry.title_id,
            tier = %entry.tier,
            rank_index = entry.rank_index,
            score = entry.score,
            comparisons = plan.comparisons.len(),
            tied = plan.tied_with().is_some(),
            "Ranking committed"
        );

        self.apply_deltas(&mutation.deltas).await;
        self.publish(RatingEvent::Rated {
            user_id: user_id.clone(),
            title_id: entry.title_id.clone(),
            media_type: entry.media_type,
            new_score: entry.score,
        })
        .await;

        Ok(RankingStep::Committed {
            comparisons: plan.comparisons.len(),
            tied_with: plan.tied_with().map(str::to_string),
            entry,
        })
    }

    /// Aggregate drift is repaired by recompute, so it never fails a ranking
    async fn apply_deltas(&self, deltas: &[ScoreDelta]) {
        if let Err(e) = self.aggregates.apply_deltas(deltas).await {
            tracing::error!(error = %e, delta_count = deltas.len(), "Aggregate update failed");
        }
    }

    async fn publish(&self, event: RatingEvent) {
        if let Err(e) = self.events.publish(&event).await {
            tracing::warn!(error = %e, ?event, "Rating event delivery failed");
        }
    }
}

fn require_id(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
