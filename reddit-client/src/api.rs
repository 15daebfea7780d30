use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitStatus, RateLimiter};
use painscout_core::{CoreError, RedditApiError, RedditPost, RedditProfile, TrendDirection};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

const HOT_ROUTE: &str = "/r/{sub}/hot";
const USER_ABOUT_ROUTE: &str = "/user/{name}/about";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub is_self: bool,
}

/// `/user/{name}/about` payload. Suspended accounts come back with only
/// `name` and `is_suspended`, so everything else defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub name: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
    #[serde(default)]
    pub is_suspended: bool,
}

impl From<RedditUserData> for RedditProfile {
    fn from(user: RedditUserData) -> Self {
        Self {
            username: user.name,
            link_karma: user.link_karma,
            comment_karma: user.comment_karma,
            created_utc: user.created_utc as i64,
        }
    }
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        let url = if post_data.permalink.is_empty() {
            post_data.url
        } else {
            format!("https://www.reddit.com{}", post_data.permalink)
        };

        Self {
            id: post_data.id,
            title: post_data.title,
            content: if post_data.selftext.is_empty() {
                None
            } else {
                Some(post_data.selftext)
            },
            author: post_data.author,
            subreddit: post_data.subreddit,
            url,
            score: post_data.score,
            num_comments: post_data.num_comments,
            created_utc: post_data.created_utc as i64,
            viability_score: 0.0,
            is_emerging: false,
            trend_direction: TrendDirection::Stable,
        }
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
    base_url: String,
}

impl RedditApiClient {
    /// `rate_limiter` is shared with every other client drawing on the same
    /// Reddit quota.
    pub fn new(user_agent: &str, rate_limiter: Arc<RateLimiter>) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter,
            metrics: Arc::new(MetricsCollector::new()),
            base_url: REDDIT_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Issues a GET and maps non-success statuses onto `RedditApiError`.
    /// `not_found` is what a 404 means for this endpoint. Metrics are recorded
    /// for every outcome under the templated `route`.
    pub async fn make_request(
        &self,
        route: &str,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
        not_found: RedditApiError,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let permit = self.rate_limiter.acquire_permit().await;
        if permit.queue_wait_time > Duration::from_secs(1) {
            debug!(
                "Waited {:?} for a rate limit permit on {}",
                permit.queue_wait_time, route
            );
        }

        let start_time = Instant::now();
        debug!("Making Reddit API request: GET {}", endpoint);
        let sent = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await;
        drop(permit);

        let (outcome, status_code) = match sent {
            Ok(response) => {
                let status = response.status();
                (classify_status(response, endpoint, not_found), Some(status.as_u16()))
            }
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                let err = if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                };
                (Err(err), None)
            }
        };

        let error_type = outcome.as_ref().err().map(error_type_label);
        self.metrics
            .record_request(RequestMetrics {
                route: route.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: outcome.is_ok(),
                rate_limited: status_code == Some(429),
                error_type,
            })
            .await;

        outcome
    }

    /// Hot listing for one subreddit, newest Reddit ranking first.
    pub async fn get_subreddit_hot(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let endpoint = format!("/r/{}/hot", subreddit);
        let limit = limit.to_string();
        let response = self
            .make_request(
                HOT_ROUTE,
                &endpoint,
                access_token,
                &[("limit", limit.as_str()), ("raw_json", "1")],
                RedditApiError::SubredditNotFound {
                    subreddit: subreddit.to_string(),
                },
            )
            .await?;

        let listing: RedditListing<RedditPostData> =
            parse_json(response, &format!("posts for r/{}", subreddit)).await?;

        let posts: Vec<RedditPost> = listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| !post.stickied)
            .map(RedditPost::from)
            .collect();

        info!("Retrieved {} posts from r/{}", posts.len(), subreddit);
        Ok(posts)
    }

    pub async fn get_user_about(
        &self,
        access_token: &str,
        username: &str,
    ) -> Result<RedditProfile, CoreError> {
        let endpoint = format!("/user/{}/about", username);
        let response = self
            .make_request(
                USER_ABOUT_ROUTE,
                &endpoint,
                access_token,
                &[("raw_json", "1")],
                RedditApiError::UserNotFound {
                    username: username.to_string(),
                },
            )
            .await?;

        let about: RedditListingChild<RedditUserData> =
            parse_json(response, &format!("profile of u/{}", username)).await?;

        if about.data.is_suspended {
            debug!("u/{} is suspended", username);
            return Err(CoreError::RedditApi(RedditApiError::UserNotFound {
                username: username.to_string(),
            }));
        }

        Ok(about.data.into())
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

fn classify_status(
    response: Response,
    endpoint: &str,
    not_found: RedditApiError,
) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        debug!("Request successful: {} for {}", status, endpoint);
        return Ok(response);
    }

    let err = match status {
        StatusCode::UNAUTHORIZED => RedditApiError::InvalidToken,
        StatusCode::FORBIDDEN => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        StatusCode::NOT_FOUND => not_found,
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(60);
            warn!("Rate limited on {}, retry after {} seconds", endpoint, retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        s if s.is_server_error() => RedditApiError::ServerError {
            status_code: s.as_u16(),
        },
        s => RedditApiError::InvalidResponse {
            details: format!("unexpected status {} for {}", s, endpoint),
        },
    };

    if !matches!(err, RedditApiError::UserNotFound { .. }) {
        error!("Request failed with status: {} for {}", status, endpoint);
    }
    Err(CoreError::RedditApi(err))
}

async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, CoreError> {
    response.json().await.map_err(|e| {
        error!("Failed to parse {}: {}", what, e);
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Failed to parse {}", what),
        })
    })
}

fn error_type_label(err: &CoreError) -> String {
    match err {
        CoreError::RedditApi(RedditApiError::InvalidToken) => "unauthorized",
        CoreError::RedditApi(RedditApiError::Forbidden { .. }) => "forbidden",
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }) => "rate_limited",
        CoreError::RedditApi(RedditApiError::SubredditNotFound { .. })
        | CoreError::RedditApi(RedditApiError::UserNotFound { .. }) => "not_found",
        CoreError::RedditApi(RedditApiError::ServerError { .. }) => "server_error",
        CoreError::RedditApi(RedditApiError::RequestTimeout) => "timeout",
        CoreError::Network(_) => "network_error",
        _ => "invalid_response",
    }
    .to_string()
}
