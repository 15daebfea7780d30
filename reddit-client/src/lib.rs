pub mod api;
pub mod auth;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;


pub use api::RedditApiClient;
pub use auth::{AuthFlow, RedditAuth, RedditOAuth2Config, RedditToken, TokenCache};
pub use metrics::{ApiMetrics, MetricsCollector, RouteStatus, SourceStatus};
pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor};

use async_trait::async_trait;
use painscout_core::{CoreError, RedditApiError, RedditPost, RedditProfile};
use std::sync::Arc;
use tracing::debug;

/// Read access to Reddit as the discovery pipeline needs it.
#[async_trait]
pub trait RedditSource: Send + Sync {
    async fn hot_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<RedditPost>, CoreError>;

    async fn user_profile(&self, username: &str) -> Result<RedditProfile, CoreError>;

    /// Counters and limiter state, when the source keeps any.
    async fn status(&self) -> Option<SourceStatus> {
        None
    }
}

/// Authenticated Reddit client: token cache, shared rate limiter, retries.
#[derive(Debug)]
pub struct RedditClient {
    auth: RedditAuth,
    api: RedditApiClient,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(
        oauth_config: RedditOAuth2Config,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(&oauth_config.user_agent, rate_limiter)?;
        let auth = RedditAuth::new(oauth_config)?;
        Ok(Self {
            auth,
            api,
            retry: RetryExecutor::new(RetryConfig::reddit()),
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub async fn snapshot(&self) -> SourceStatus {
        let metrics = self.api.get_metrics().await;
        let limits = self.api.get_rate_limit_status().await;
        SourceStatus::from_parts(
            &metrics,
            &limits,
            self.retry.get_circuit_breaker_state().as_str(),
            self.retry.get_metrics().total_retries,
        )
    }

    /// A 401 means the cached token went bad early; drop it so the retry
    /// fetches a new one.
    async fn forget_token_on_401<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            self.auth.invalidate().await;
        }
        result
    }
}

#[async_trait]
impl RedditSource for RedditClient {
    async fn hot_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<RedditPost>, CoreError> {
        self.retry
            .execute("hot_posts", move || async move {
                let token = self.auth.access_token().await?;
                let result = self.api.get_subreddit_hot(&token, subreddit, limit).await;
                self.forget_token_on_401(result).await
            })
            .await
    }

    async fn user_profile(&self, username: &str) -> Result<RedditProfile, CoreError> {
        debug!("Fetching profile for u/{}", username);
        self.retry
            .execute("user_profile", move || async move {
                let token = self.auth.access_token().await?;
                let result = self.api.get_user_about(&token, username).await;
                self.forget_token_on_401(result).await
            })
            .await
    }

    async fn status(&self) -> Option<SourceStatus> {
        Some(self.snapshot().await)
    }
}
