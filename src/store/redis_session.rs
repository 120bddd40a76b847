use std::time::Duration;

use redis::{AsyncCommands, Client};

use crate::{
    db::CacheKey,
    error::{AppError, AppResult},
    services::comparison::ComparisonSession,
};

use super::SessionStore;

/// Overwrites the stored session only if it still has the caller's id,
/// keeping the remaining TTL
const SAVE_IF_CURRENT: &str = r#"
    local current = redis.call('GET', KEYS[1])
    if not current then
        return 0
    end
    local ok, stored = pcall(cjson.decode, current)
    if not ok or stored['id'] ~= ARGV[1] then
        return 0
    end
    redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
    return 1
"#;

/// Comparison sessions stored as JSON in Redis with an expiry
///
/// `SET NX` makes creation atomic across API instances, so two concurrent
/// starts for the same user cannot both open a session. Saves go through a
/// Lua script that checks the session id and writes in one step.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis_client: Client,
    ttl: Duration,
}

impl RedisSessionStore {
    pub fn new(redis_client: Client, ttl: Duration) -> Self {
        Self { redis_client, ttl }
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &ComparisonSession) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let key = CacheKey::ComparisonSession(session.user_id.clone()).to_string();
        let json = serde_json::to_string(session)?;

        let reply: redis::Value = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(&mut conn)
            .await?;

        if matches!(reply, redis::Value::Nil) {
            return Err(AppError::SessionConflict {
                user_id: session.user_id.clone(),
            });
        }

        tracing::debug!(key = %key, ttl_secs = self.ttl_secs(), "Comparison session stored");
        Ok(())
    }

    async fn get(&self, user_id: &str) -> AppResult<Option<ComparisonSession>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let key = CacheKey::ComparisonSession(user_id.to_string()).to_string();
        let cached: Option<String> = conn.get(&key).await?;

        match cached {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &ComparisonSession) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let key = CacheKey::ComparisonSession(session.user_id.clone()).to_string();
        let json = serde_json::to_string(session)?;

        let saved: i64 = redis::Script::new(SAVE_IF_CURRENT)
            .key(&key)
            .arg(session.id.to_string())
            .arg(json)
            .invoke_async(&mut conn)
            .await?;

        // Expired, cancelled, or replaced by a newer session
        if saved == 0 {
            return Err(AppError::NoActiveSession(session.user_id.clone()));
        }
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> AppResult<bool> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let key = CacheKey::ComparisonSession(user_id.to_string()).to_string();
        let removed: i64 = conn.del(&key).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_redis_client;
    use crate::models::{Candidate, MediaType, SentimentTier};
    use crate::services::comparison::SnapshotEntry;

    fn session(user: &str) -> ComparisonSession {
        ComparisonSession::begin(
            user,
            Candidate {
                title_id: "tt0816692".to_string(),
                media_type: MediaType::Movie,
            },
            SentimentTier::Liked,
            vec![SnapshotEntry {
                title_id: "tt1375666".to_string(),
                media_type: MediaType::Movie,
                rank_index: 0,
                score: 10.0,
            }],
        )
    }

    fn store() -> RedisSessionStore {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = create_redis_client(&redis_url).unwrap();
        RedisSessionStore::new(client, Duration::from_secs(60))
    }

    #[test]
    fn test_ttl_is_at_least_one_second() {
        let client = create_redis_client("redis://localhost:6379").unwrap();
        let store = RedisSessionStore::new(client, Duration::from_millis(10));
        assert_eq!(store.ttl_secs(), 1);
    }

    #[test]
    fn test_session_survives_json_round_trip() {
        let open = session("u1");
        let json = serde_json::to_string(&open).unwrap();
        let restored: ComparisonSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, open);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_redis_create_conflict_and_remove() {
        let store = store();
        let user = format!("redis-test-{}", uuid::Uuid::new_v4());
        let open = session(&user);

        store.create(&open).await.unwrap();
        let err = store.create(&session(&user)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionConflict { .. }));

        assert_eq!(store.get(&user).await.unwrap(), Some(open.clone()));
        store.save(&open).await.unwrap();
        assert!(store.remove(&user).await.unwrap());
        assert!(store.get(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_redis_stale_save_cannot_replace_newer_session() {
        let store = store();
        let user = format!("redis-test-{}", uuid::Uuid::new_v4());

        let stale = session(&user);
        store.create(&stale).await.unwrap();
        store.remove(&user).await.unwrap();

        let replacement = session(&user);
        store.create(&replacement).await.unwrap();

        let err = store.save(&stale).await.unwrap_err();
        assert!(matches!(err, AppError::NoActiveSession(_)));
        assert_eq!(store.get(&user).await.unwrap(), Some(replacement));

        store.remove(&user).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_redis_save_after_expiry_fails() {
        let store = store();
        let user = format!("redis-test-{}", uuid::Uuid::new_v4());

        let err = store.save(&session(&user)).await.unwrap_err();
        assert!(matches!(err, AppError::NoActiveSession(_)));
    }
}
