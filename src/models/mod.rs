use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

mod aggregate;
mod tier;

pub use aggregate::{AggregateRating, DeltaSet, ScoreDelta};
pub use tier::SentimentTier;

/// Kind of title being ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "series" | "tv_series" => Ok(MediaType::Series),
            other => Err(format!("unknown media type '{}'", other)),
        }
    }
}

/// A title the user is about to place, or is placing again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title_id: String,
    pub media_type: MediaType,
}

/// One title's position in a user's personal ranking
///
/// `rank_index` is dense within (user, tier) and `score` is always derived
/// from (tier, rank_index, tier size); neither is settable by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub user_id: String,
    pub title_id: String,
    pub media_type: MediaType,
    pub tier: SentimentTier,
    pub rank_index: usize,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

impl RankedEntry {
    /// Creates an unplaced entry; the repository assigns index and score
    pub fn new(user_id: &str, candidate: &Candidate, tier: SentimentTier) -> Self {
        Self {
            user_id: user_id.to_string(),
            title_id: candidate.title_id.clone(),
            media_type: candidate.media_type,
            tier,
            rank_index: 0,
            score: 0.0,
            created_at: Utc::now(),
        }
    }
}

/// Payload handed to the notification collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RatingEvent {
    Rated {
        user_id: String,
        title_id: String,
        media_type: MediaType,
        new_score: f64,
    },
    Removed {
        user_id: String,
        title_id: String,
    },
}
