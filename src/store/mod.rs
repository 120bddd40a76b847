//! Storage abstractions for rankings, aggregates and open comparison sessions
//!
//! Each trait has an in-memory implementation for tests and single-node dev,
//! and a networked one: PostgreSQL for entries and aggregates, Redis for sessions.

use crate::{
    error::AppResult,
    models::{AggregateRating, MediaType, RankedEntry, ScoreDelta, SentimentTier},
    services::comparison::ComparisonSession,
};

pub mod memory;
pub mod postgres;
pub mod redis_session;

pub use memory::{InMemoryAggregateStore, InMemoryRankingStore, InMemorySessionStore};
pub use postgres::{PgAggregateStore, PgRankingStore};
pub use redis_session::RedisSessionStore;

/// Result of one atomic mutation of a user's tiers
#[derive(Debug, Clone)]
pub struct TierMutation {
    /// The target tier after the mutation, in rank order
    pub tier_entries: Vec<RankedEntry>,
    /// The entry that was placed, for inserts
    pub entry: Option<RankedEntry>,
    /// Score changes for the aggregate service, one per affected title
    pub deltas: Vec<ScoreDelta>,
}

/// Owner of every user's ordered ranked entries
///
/// Mutations for one user are applied as a single atomic unit: index shifting
/// and re-scoring are never observable half-applied.
#[async_trait::async_trait]
pub trait RankingStore: Send + Sync {
    /// Entries of one tier in rank order
    async fn tier_entries(&self, user_id: &str, tier: SentimentTier)
        -> AppResult<Vec<RankedEntry>>;

    /// All of a user's entries, best tier first
    async fn user_entries(&self, user_id: &str) -> AppResult<Vec<RankedEntry>>;

    async fn find_entry(&self, user_id: &str, title_id: &str) -> AppResult<Option<RankedEntry>>;

    /// Places `entry` at `index` in `tier`, replacing the user's existing entry
    /// for the same title if there is one
    async fn insert(
        &self,
        user_id: &str,
        tier: SentimentTier,
        index: usize,
        entry: RankedEntry,
    ) -> AppResult<TierMutation>;

    async fn remove(
        &self,
        user_id: &str,
        tier: SentimentTier,
        title_id: &str,
    ) -> AppResult<TierMutation>;

    /// Removes every entry the user holds; a second call is a no-op
    async fn remove_all_for_user(&self, user_id: &str) -> AppResult<Vec<ScoreDelta>>;

    /// Every user's current score for a title
    async fn title_scores(&self, title_id: &str) -> AppResult<Vec<(MediaType, f64)>>;
}

/// Per-title community aggregates
#[async_trait::async_trait]
pub trait AggregateStore: Send + Sync {
    /// Atomically adds to the stored sum and count, creating the row on first
    /// contribution and deleting it once the count drops to zero
    async fn increment(
        &self,
        title_id: &str,
        media_type: MediaType,
        sum_delta: f64,
        count_delta: i64,
    ) -> AppResult<Option<AggregateRating>>;

    /// Overwrites the totals; a zero count deletes the row
    async fn replace(
        &self,
        title_id: &str,
        media_type: MediaType,
        sum: f64,
        count: i64,
    ) -> AppResult<Option<AggregateRating>>;

    async fn get(&self, title_id: &str) -> AppResult<Option<AggregateRating>>;

    /// Drops the row; returns whether one existed
    async fn delete(&self, title_id: &str) -> AppResult<bool>;
}

/// Transient home of open comparison sessions, one per user
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session, failing with `SessionConflict` if the user
    /// already has one open
    async fn create(&self, session: &ComparisonSession) -> AppResult<()>;

    async fn get(&self, user_id: &str) -> AppResult<Option<ComparisonSession>>;

    /// Overwrites the user's open session without extending its lifetime
    async fn save(&self, session: &ComparisonSession) -> AppResult<()>;

    /// Returns whether a session was open
    async fn remove(&self, user_id: &str) -> AppResult<bool>;
}
