use serde::Deserialize;
use std::time::Duration;

use crate::services::{retry::RetryConfig, ScoreScale, TierBoundary};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; rankings stay in memory when unset
    pub database_url: Option<String>,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// Redis connection URL; sessions stay in memory when unset
    pub redis_url: Option<String>,

    /// Lifetime of an open comparison session
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Whether adjacent sentiment bands share their boundary score
    #[serde(default)]
    pub score_boundary: TierBoundary,

    #[serde(default = "default_score_boundary_epsilon")]
    pub score_boundary_epsilon: f64,

    #[serde(default = "default_aggregate_max_retries")]
    pub aggregate_max_retries: u32,

    #[serde(default = "default_aggregate_retry_backoff_ms")]
    pub aggregate_retry_backoff_ms: u64,

    /// Rating events are POSTed here; logged only when unset
    pub notification_webhook_url: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_session_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_score_boundary_epsilon() -> f64 {
    0.1
}

fn default_aggregate_max_retries() -> u32 {
    3
}

fn default_aggregate_retry_backoff_ms() -> u64 {
    50
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: default_database_max_connections(),
            redis_url: None,
            session_ttl_secs: default_session_ttl_secs(),
            score_boundary: TierBoundary::default(),
            score_boundary_epsilon: default_score_boundary_epsilon(),
            aggregate_max_retries: default_aggregate_max_retries(),
            aggregate_retry_backoff_ms: default_aggregate_retry_backoff_ms(),
            notification_webhook_url: None,
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_iter(std::env::vars())
    }

    fn from_iter(vars: impl IntoIterator<Item = (String, String)>) -> anyhow::Result<Self> {
        let config = envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        if !(config.score_boundary_epsilon > 0.0 && config.score_boundary_epsilon < 1.0) {
            anyhow::bail!(
                "SCORE_BOUNDARY_EPSILON must be in (0, 1), got {}",
                config.score_boundary_epsilon
            );
        }
        if config.session_ttl_secs == 0 {
            anyhow::bail!("SESSION_TTL_SECS must be positive");
        }

        Ok(config)
    }

    pub fn score_scale(&self) -> ScoreScale {
        ScoreScale::new(self.score_boundary, self.score_boundary_epsilon)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.aggregate_max_retries,
            initial_backoff: Duration::from_millis(self.aggregate_retry_backoff_ms),
            ..RetryConfig::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_use_in_memory_backends() {
        let config = Config::from_iter(vars(&[])).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.session_ttl(), Duration::from_secs(1800));
        assert_eq!(config.score_boundary, TierBoundary::Inclusive);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides_are_read() {
        let config = Config::from_iter(vars(&[
            ("DATABASE_URL", "postgres://localhost/tierlist"),
            ("SCORE_BOUNDARY", "exclusive"),
            ("SCORE_BOUNDARY_EPSILON", "0.05"),
            ("AGGREGATE_MAX_RETRIES", "5"),
            ("AGGREGATE_RETRY_BACKOFF_MS", "10"),
            ("PORT", "8080"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/tierlist"));
        assert_eq!(config.score_scale().boundary(), TierBoundary::Exclusive);

        let retry = config.retry();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.initial_backoff, Duration::from_millis(10));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_iter(vars(&[("SCORE_BOUNDARY", "sideways")])).is_err());
        assert!(Config::from_iter(vars(&[("SCORE_BOUNDARY_EPSILON", "2.5")])).is_err());
        assert!(Config::from_iter(vars(&[("SESSION_TTL_SECS", "0")])).is_err());
    }
}
