use redis::Client;
use std::fmt::Display;

/// Keys under which transient state lives in Redis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The user's open comparison session
    ComparisonSession(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::ComparisonSession(user_id) => write!(f, "session:{}", user_id),
        }
    }
}

/// Creates a Redis client
///
/// Connections are multiplexed per call via `get_multiplexed_async_connection`.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}
