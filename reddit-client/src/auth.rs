use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RefreshToken, TokenResponse,
    TokenUrl,
};
use painscout_core::{CoreError, RedditApiError};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are treated as expired this long before Reddit says they are.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Reddit hands out one-hour tokens when it omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthFlow {
    /// Application-only access; enough for public listings.
    ClientCredentials,
    /// User-context access from a long-lived refresh token.
    RefreshToken(String),
}

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub flow: AuthFlow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: Option<String>,
}

impl RedditToken {
    pub fn new(access_token: String, expires_in: Duration, now: DateTime<Utc>) -> Self {
        let lifetime = ChronoDuration::from_std(expires_in)
            .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_TOKEN_LIFETIME_SECS as i64));
        Self {
            access_token,
            expires_at: now + lifetime,
            scope: None,
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// Holds at most one access token. Concurrent callers that find it stale
/// wait on the same refresh instead of each hitting the token endpoint.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: Mutex<Option<RedditToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<RedditToken, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RedditToken, CoreError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh_at(now)) {
            return Ok(token.clone());
        }

        debug!("Access token missing or near expiry, fetching a new one");
        let token = fetch().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    pub async fn current(&self) -> Option<RedditToken> {
        self.slot.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

/// Fetches and caches Reddit access tokens for one OAuth flow.
#[derive(Debug)]
pub struct RedditAuth {
    oauth_client: BasicClient,
    http_client: Client,
    flow: AuthFlow,
    cache: TokenCache,
}

impl RedditAuth {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("invalid authorize url: {}", e),
            })
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("invalid token url: {}", e),
            })
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id),
            Some(ClientSecret::new(config.client_secret)),
            auth_url,
            Some(token_url),
        );

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            oauth_client,
            http_client,
            flow: config.flow,
            cache: TokenCache::new(),
        })
    }

    pub fn flow(&self) -> &AuthFlow {
        &self.flow
    }

    /// Returns a bearer token, fetching one when the cached token is stale.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let token = self
            .cache
            .get_or_fetch(Utc::now(), || self.request_token())
            .await?;
        Ok(token.access_token)
    }

    /// Drops the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        warn!("Discarding cached Reddit access token");
        self.cache.invalidate().await;
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        let http = self.http_client.clone();
        let send = |request: HttpRequest| send_token_request(http.clone(), request);

        let response = match &self.flow {
            AuthFlow::ClientCredentials => {
                self.oauth_client
                    .exchange_client_credentials()
                    .request_async(send)
                    .await
            }
            AuthFlow::RefreshToken(refresh_token) => {
                self.oauth_client
                    .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
                    .request_async(send)
                    .await
            }
        }
        .map_err(|e| {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: e.to_string(),
            })
        })?;

        let expires_in = response
            .expires_in()
            .unwrap_or(Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS));
        let mut token = RedditToken::new(
            response.access_token().secret().clone(),
            expires_in,
            Utc::now(),
        );
        token.scope = response.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });

        info!(
            "Obtained Reddit access token ({}), expires at {}",
            self.flow_label(),
            token.expires_at
        );
        Ok(token)
    }

    fn flow_label(&self) -> &'static str {
        match self.flow {
            AuthFlow::ClientCredentials => "client_credentials",
            AuthFlow::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Token endpoint transport: reqwest with our user agent, since Reddit
/// rejects the default one.
async fn send_token_request(
    http: Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
