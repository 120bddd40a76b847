//! Interactive binary insertion of one title into a sentiment band.
//!
//! A [`ComparisonSession`] is pure state: bounds, a snapshot of the band, and
//! the log of answers so far. Callers advance it with [`ComparisonSession::resolve`]
//! and read the next question with [`ComparisonSession::next_prompt`]; nothing
//! here touches storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Candidate, MediaType, RankedEntry, SentimentTier},
};

/// Three-way answer to "is the candidate better than this title?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonAnswer {
    CandidateBetter,
    ExistingBetter,
    TooCloseToCall,
}

impl FromStr for ComparisonAnswer {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "candidate_better" => Ok(ComparisonAnswer::CandidateBetter),
            "existing_better" => Ok(ComparisonAnswer::ExistingBetter),
            "too_close_to_call" => Ok(ComparisonAnswer::TooCloseToCall),
            other => Err(AppError::InvalidComparisonAnswer(format!(
                "'{}' is not one of candidate_better, existing_better, too_close_to_call",
                other
            ))),
        }
    }
}

/// The slice of an existing entry a session needs to ask questions about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub title_id: String,
    pub media_type: MediaType,
    pub rank_index: usize,
    pub score: f64,
}

impl From<&RankedEntry> for SnapshotEntry {
    fn from(entry: &RankedEntry) -> Self {
        Self {
            title_id: entry.title_id.clone(),
            media_type: entry.media_type,
            rank_index: entry.rank_index,
            score: entry.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedComparison {
    pub existing_title_id: String,
    pub existing_rank_index: usize,
    pub answer: ComparisonAnswer,
}

/// Question the caller must answer before the search can continue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    pub session_id: Uuid,
    pub tier: SentimentTier,
    pub candidate_title_id: String,
    pub existing_title_id: String,
    pub existing_rank_index: usize,
    pub comparisons_made: usize,
    /// Upper bound on questions left if no tie is declared
    pub max_remaining: usize,
}

/// Where the search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// Bounds converged on this index
    Converged { index: usize },
    /// A tie with the entry at `tied_index` ended the search early; the
    /// candidate goes immediately after it
    Tied { tied_index: usize },
}

impl Placement {
    /// Position the candidate occupies in the committed tier
    pub fn insertion_index(&self) -> usize {
        match self {
            Placement::Converged { index } => *index,
            Placement::Tied { tied_index } => tied_index + 1,
        }
    }
}

/// Everything the repository needs to persist a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionPlan {
    pub session_id: Uuid,
    pub user_id: String,
    pub candidate: Candidate,
    pub tier: SentimentTier,
    pub placement: Placement,
    pub index: usize,
    pub comparisons: Vec<ResolvedComparison>,
    /// Number of entries in the band when the session started
    pub snapshot_len: usize,
}

impl InsertionPlan {
    pub fn tied_with(&self) -> Option<&str> {
        self.comparisons
            .last()
            .filter(|c| c.answer == ComparisonAnswer::TooCloseToCall)
            .map(|c| c.existing_title_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Prompt(ComparisonRequest),
    Done(Placement),
}

/// Binary-insertion state for one candidate in one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSession {
    pub id: Uuid,
    pub user_id: String,
    pub candidate: Candidate,
    pub tier: SentimentTier,
    pub started_at: DateTime<Utc>,
    snapshot: Vec<SnapshotEntry>,
    lo: usize,
    hi: usize,
    log: Vec<ResolvedComparison>,
    outcome: Option<Placement>,
}

impl ComparisonSession {
    /// Starts an insertion against the band's current order
    ///
    /// The snapshot must already be sorted by rank index and must not contain
    /// the candidate itself. An empty band is resolved immediately at index 0.
    pub fn begin(
        user_id: &str,
        candidate: Candidate,
        tier: SentimentTier,
        snapshot: Vec<SnapshotEntry>,
    ) -> Self {
        let hi = snapshot.len();
        let outcome = (hi == 0).then_some(Placement::Converged { index: 0 });

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            candidate,
            tier,
            started_at: Utc::now(),
            snapshot,
            lo: 0,
            hi,
            log: Vec::new(),
            outcome,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn comparisons(&self) -> &[ResolvedComparison] {
        &self.log
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.lo, self.hi)
    }

    fn mid(&self) -> usize {
        (self.lo + self.hi) / 2
    }

    pub fn next_prompt(&self) -> NextStep {
        if let Some(placement) = self.outcome {
            return NextStep::Done(placement);
        }

        let mid = self.mid();
        let existing = &self.snapshot[mid];
        NextStep::Prompt(ComparisonRequest {
            session_id: self.id,
            tier: self.tier,
            candidate_title_id: self.candidate.title_id.clone(),
            existing_title_id: existing.title_id.clone(),
            existing_rank_index: mid,
            comparisons_made: self.log.len(),
            max_remaining: max_comparisons(self.hi - self.lo),
        })
    }

    /// Applies the caller's answer to the pending prompt
    pub fn resolve(&mut self, answer: ComparisonAnswer) -> AppResult<NextStep> {
        if self.outcome.is_some() {
            return Err(AppError::InvalidInput(format!(
                "comparison session {} is already resolved",
                self.id
            )));
        }

        let mid = self.mid();
        self.log.push(ResolvedComparison {
            existing_title_id: self.snapshot[mid].title_id.clone(),
            existing_rank_index: mid,
            answer,
        });

        match answer {
            ComparisonAnswer::CandidateBetter => self.hi = mid,
            ComparisonAnswer::ExistingBetter => self.lo = mid + 1,
            ComparisonAnswer::TooCloseToCall => {
                self.outcome = Some(Placement::Tied { tied_index: mid });
            }
        }

        if self.outcome.is_none() && self.lo >= self.hi {
            self.outcome = Some(Placement::Converged { index: self.lo });
        }

        tracing::debug!(
            session_id = %self.id,
            user_id = %self.user_id,
            ?answer,
            lo = self.lo,
            hi = self.hi,
            resolved = self.outcome.is_some(),
            "Comparison resolved"
        );

        Ok(self.next_prompt())
    }

    /// Consumes a resolved session into the plan the repository commits
    pub fn commit(self) -> AppResult<InsertionPlan> {
        let placement = self.outcome.ok_or_else(|| {
            AppError::InvalidInput(format!(
                "comparison session {} still has unanswered prompts",
                self.id
            ))
        })?;

        Ok(InsertionPlan {
            session_id: self.id,
            user_id: self.user_id,
            candidate: self.candidate,
            tier: self.tier,
            index: placement.insertion_index(),
            placement,
            comparisons: self.log,
            snapshot_len: self.snapshot.len(),
        })
    }
}

/// ceil(log2(n + 1)): questions needed to place one title among `n` without ties
pub fn max_comparisons(n: usize) -> usize {
    (usize::BITS - n.leading_zeros()) as usize
}
