use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Sentiment band a user places a title in
///
/// Bands are totally ordered: every `Liked` entry outranks every `Neutral`
/// entry, which outranks every `Disliked` entry. Comparisons only ever happen
/// between titles of the same band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTier {
    Disliked,
    #[serde(alias = "fine")]
    Neutral,
    Liked,
}

impl SentimentTier {
    /// All tiers, best band first
    pub const ALL: [SentimentTier; 3] = [
        SentimentTier::Liked,
        SentimentTier::Neutral,
        SentimentTier::Disliked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentTier::Disliked => "disliked",
            SentimentTier::Neutral => "neutral",
            SentimentTier::Liked => "liked",
        }
    }
}

impl Display for SentimentTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SentimentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disliked" => Ok(SentimentTier::Disliked),
            "neutral" | "fine" => Ok(SentimentTier::Neutral),
            "liked" => Ok(SentimentTier::Liked),
            other => Err(format!("unknown sentiment tier '{}'", other)),
        }
    }
}
