use std::sync::Arc;

use crate::{
    config::Config,
    db::{create_pool, create_redis_client},
    services::{
        AccountFinalizer, AggregateRatingService, LogAccountFinalizer, LogEventSink,
        RankingService, RatingEventSink, WebhookEventSink,
    },
    store::{
        AggregateStore, InMemoryAggregateStore, InMemoryRankingStore, InMemorySessionStore,
        PgAggregateStore, PgRankingStore, RankingStore, RedisSessionStore, SessionStore,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ranking: Arc<RankingService>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates state backed entirely by in-memory stores
    pub fn new() -> Self {
        Self::in_memory(&Config::default())
    }

    pub fn in_memory(config: &Config) -> Self {
        let rankings: Arc<dyn RankingStore> =
            Arc::new(InMemoryRankingStore::new(config.score_scale()));
        let aggregates: Arc<dyn AggregateStore> = Arc::new(InMemoryAggregateStore::new());
        let sessions: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(config.session_ttl()));

        Self::assemble(config, rankings, aggregates, sessions)
    }

    /// Connects the stores named in `config`, falling back to memory for any
    /// backend without a URL
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (rankings, aggregates): (Arc<dyn RankingStore>, Arc<dyn AggregateStore>) =
            match &config.database_url {
                Some(url) => {
                    let pool = create_pool(url, config.database_max_connections).await?;
                    (
                        Arc::new(PgRankingStore::new(pool.clone(), config.score_scale())),
                        Arc::new(PgAggregateStore::new(pool)),
                    )
                }
                None => {
                    tracing::warn!("DATABASE_URL not set, rankings are kept in memory");
                    (
                        Arc::new(InMemoryRankingStore::new(config.score_scale())),
                        Arc::new(InMemoryAggregateStore::new()),
                    )
                }
            };

        let sessions: Arc<dyn SessionStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisSessionStore::new(
                create_redis_client(url)?,
                config.session_ttl(),
            )),
            None => {
                tracing::warn!("REDIS_URL not set, comparison sessions are kept in memory");
                Arc::new(InMemorySessionStore::new(config.session_ttl()))
            }
        };

        Ok(Self::assemble(config, rankings, aggregates, sessions))
    }

    fn assemble(
        config: &Config,
        rankings: Arc<dyn RankingStore>,
        aggregates: Arc<dyn AggregateStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let events: Arc<dyn RatingEventSink> = match &config.notification_webhook_url {
            Some(url) => Arc::new(WebhookEventSink::new(url.clone())),
            None => Arc::new(LogEventSink),
        };
        let finalizer: Arc<dyn AccountFinalizer> = Arc::new(LogAccountFinalizer);

        let aggregate_service = Arc::new(AggregateRatingService::new(
            aggregates,
            rankings.clone(),
            config.retry(),
        ));

        Self {
            ranking: Arc::new(RankingService::new(
                rankings,
                sessions,
                aggregate_service,
                events,
                finalizer,
            )),
        }
    }
}
