pub mod aggregate;
pub mod collaborators;
pub mod comparison;
pub mod ranking;
pub mod retry;
pub mod scoring;
pub mod tiers;

pub use aggregate::AggregateRatingService;
pub use collaborators::{
    AccountFinalizer, LogAccountFinalizer, LogEventSink, RatingEventSink, WebhookEventSink,
};
pub use ranking::{AccountDeletion, RankingService, RankingStep};
pub use scoring::{ScoreScale, TierBoundary};
