//! Outbound seams to the notification and account services
//!
//! Both are fire-and-forget from the ranking flow's point of view: callers log
//! delivery failures and carry on.

use reqwest::Client as HttpClient;

use crate::{error::AppResult, models::RatingEvent};

/// Consumer of rating and removal events (feeds, social fan-out)
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingEventSink: Send + Sync {
    async fn publish(&self, event: &RatingEvent) -> AppResult<()>;
}

/// Account service hook invoked once a user's rankings are gone
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccountFinalizer: Send + Sync {
    async fn finalize_account_removal(&self, user_id: &str) -> AppResult<()>;
}

/// Writes events to the log
#[derive(Debug, Default, Clone)]
pub struct LogEventSink;

#[async_trait::async_trait]
impl RatingEventSink for LogEventSink {
    async fn publish(&self, event: &RatingEvent) -> AppResult<()> {
        match event {
            RatingEvent::Rated {
                user_id,
                title_id,
                media_type,
                new_score,
            } => tracing::info!(
                user_id = %user_id,
                title_id = %title_id,
                media_type = %media_type,
                new_score,
                "Title rated"
            ),
            RatingEvent::Removed { user_id, title_id } => {
                tracing::info!(user_id = %user_id, title_id = %title_id, "Rating removed")
            }
        }
        Ok(())
    }
}

/// POSTs each event as JSON to a fixed URL
#[derive(Clone)]
pub struct WebhookEventSink {
    http_client: HttpClient,
    url: String,
}

impl WebhookEventSink {
    pub fn new(url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            url,
        }
    }
}

#[async_trait::async_trait]
impl RatingEventSink for WebhookEventSink {
    async fn publish(&self, event: &RatingEvent) -> AppResult<()> {
        let response = self.http_client.post(&self.url).json(event).send().await?;

        tracing::debug!(
            url = %self.url,
            status = %response.status(),
            "Rating event delivered"
        );

        response.error_for_status()?;
        Ok(())
    }
}

/// Logs the removal; the account service proper lives elsewhere
#[derive(Debug, Default, Clone)]
pub struct LogAccountFinalizer;

#[async_trait::async_trait]
impl AccountFinalizer for LogAccountFinalizer {
    async fn finalize_account_removal(&self, user_id: &str) -> AppResult<()> {
        tracing::info!(user_id = %user_id, "Account rankings removed, finalizing account");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use tokio_test::{assert_err, assert_ok};

    fn rated() -> RatingEvent {
        RatingEvent::Rated {
            user_id: "u1".to_string(),
            title_id: "tt0816692".to_string(),
            media_type: MediaType::Movie,
            new_score: 9.0,
        }
    }

    #[tokio::test]
    async fn test_log_sink_accepts_every_event() {
        let sink = LogEventSink;
        assert_ok!(sink.publish(&rated()).await);
        assert_ok!(
            sink.publish(&RatingEvent::Removed {
                user_id: "u1".to_string(),
                title_id: "tt0816692".to_string(),
            })
            .await
        );
    }

    #[tokio::test]
    async fn test_webhook_sink_reports_unreachable_target() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let sink = WebhookEventSink::new("http://127.0.0.1:9/events".to_string());
        assert_err!(sink.publish(&rated()).await);
    }

    #[tokio::test]
    async fn test_log_finalizer_succeeds() {
        assert_ok!(LogAccountFinalizer.finalize_account_removal("u1").await);
    }
}
