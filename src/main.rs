use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use billing::{mailer_from_config, WebhookProcessor};
use database::Database;
use discovery_engine::{ContactDiscovery, TrendAnalyzer};
use llm_interface::{provider_from_config, IdeaGenerator, LlmProvider};
use painscout_core::config::{AppConfig, RedditConfig};
use reddit_client::{
    AuthFlow, RateLimitConfig, RateLimiter, RedditClient, RedditOAuth2Config, RedditSource,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use web_api::AppState;

const DEFAULT_LOG_FILTER: &str =
    "painscout=info,web_api=info,discovery_engine=info,billing=info,reddit_client=info,database=info,llm_interface=info";

fn reddit_client(
    config: &RedditConfig,
    flow: AuthFlow,
    limiter: Arc<RateLimiter>,
) -> anyhow::Result<Arc<dyn RedditSource>> {
    let oauth = RedditOAuth2Config {
        client_id: config.client_id.clone().unwrap_or_default(),
        client_secret: config.client_secret.clone().unwrap_or_default(),
        user_agent: config.user_agent.clone(),
        flow,
    };
    let client = RedditClient::new(oauth, limiter)?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting painscout v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    // Both clients use the same client id, so they draw on one Reddit quota.
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth()));

    // Public listings only need an app token; profile lookups go through the
    // user's refresh token when one is configured.
    let trends_source = reddit_client(
        &config.reddit,
        AuthFlow::ClientCredentials,
        limiter.clone(),
    )?;
    let contacts_flow = match &config.reddit.refresh_token {
        Some(token) if !token.is_empty() => AuthFlow::RefreshToken(token.clone()),
        _ => AuthFlow::ClientCredentials,
    };
    let contacts_source = reddit_client(
        &config.reddit,
        contacts_flow,
        limiter,
    )?;

    let webhook_secret = config.billing.webhook_secret.clone().unwrap_or_default();
    let provider = provider_from_config(&config.llm)?;
    info!("Using LLM provider: {}", provider.name());

    let state = Arc::new(AppState {
        trends: TrendAnalyzer::new(
            trends_source,
            db.clone(),
            config.reddit.subreddits.clone(),
            Duration::from_secs(config.reddit.trend_cache_minutes * 60),
        ),
        contacts: ContactDiscovery::new(contacts_source, db.clone()),
        webhooks: WebhookProcessor::new(
            db.clone(),
            webhook_secret,
            mailer_from_config(&config.email)?,
        ),
        ideas: IdeaGenerator::new(provider, db.clone()),
        api_key: config.server.api_key.clone().filter(|k| !k.is_empty()),
        db,
    });

    if state.api_key.is_none() {
        warn!("server.api_key is not set; user-facing routes are unauthenticated");
    }

    web_api::serve(&config.server.bind_addr, state)
        .await
        .with_context(|| format!("serving on {}", config.server.bind_addr))
}
