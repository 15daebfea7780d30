use crate::scoring::{
    annotate_post, calculate_opportunity_score, calculate_sentiment_score,
    extract_trending_topics, is_pain_point, keep_for_analysis, problem_keyword_density,
    weekly_growth,
};
use chrono::{DateTime, Utc};
use database::Database;
use futures::future::join_all;
use painscout_core::{CoreError, RedditPost};
use reddit_client::{RedditSource, SourceStatus};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const HOT_POSTS_PER_SUBREDDIT: u32 = 50;
pub const SUBREDDIT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const TOP_OPPORTUNITIES: usize = 5;
const TOP_POSTS_PER_SUBREDDIT: usize = 5;

pub const ALL_SUBREDDITS_FAILED: &str = "Unable to reach the Reddit API for any subreddit. \
     Reddit commonly blocks requests from cloud IPs; try again later or from a different network.";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubredditAnalysis {
    pub subreddit: String,
    pub total_posts: usize,
    pub pain_points: usize,
    pub avg_score: f64,
    pub avg_comments: f64,
    pub sentiment_score: f64,
    pub opportunity_score: f64,
    pub trending_topics: Vec<String>,
    pub top_posts: Vec<RedditPost>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub total_topics: usize,
    pub active_communities: usize,
    pub weekly_growth: f64,
    pub top_opportunities: Vec<SubredditAnalysis>,
    pub full_analysis: Vec<SubredditAnalysis>,
    pub generated_at: DateTime<Utc>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scores one subreddit's hot listing. `posts` are already annotated.
pub fn analyze_subreddit(subreddit: &str, posts: &[RedditPost]) -> SubredditAnalysis {
    let kept: Vec<RedditPost> = posts.iter().filter(|p| keep_for_analysis(p)).cloned().collect();
    let count = kept.len();

    let (avg_score, avg_comments) = if count == 0 {
        (0.0, 0.0)
    } else {
        (
            kept.iter().map(|p| p.score as f64).sum::<f64>() / count as f64,
            kept.iter().map(|p| p.num_comments as f64).sum::<f64>() / count as f64,
        )
    };

    let text: String = kept
        .iter()
        .map(|p| p.full_text())
        .collect::<Vec<_>>()
        .join(" ");
    let density = problem_keyword_density(&kept);

    let mut top_posts: Vec<RedditPost> = kept.iter().filter(|p| is_pain_point(p)).cloned().collect();
    top_posts.sort_by(|a, b| b.viability_score.total_cmp(&a.viability_score));
    top_posts.truncate(TOP_POSTS_PER_SUBREDDIT);

    SubredditAnalysis {
        subreddit: subreddit.to_string(),
        total_posts: count,
        pain_points: kept.iter().filter(|p| is_pain_point(p)).count(),
        avg_score: round1(avg_score),
        avg_comments: round1(avg_comments),
        sentiment_score: round1(calculate_sentiment_score(&text)),
        opportunity_score: round1(calculate_opportunity_score(avg_score, avg_comments, density)),
        trending_topics: extract_trending_topics(&kept),
        top_posts,
    }
}

pub fn summarize(
    analyses: Vec<SubredditAnalysis>,
    all_posts: &[RedditPost],
    now: DateTime<Utc>,
) -> TrendSummary {
    let topics: BTreeSet<&str> = analyses
        .iter()
        .flat_map(|a| a.trending_topics.iter().map(String::as_str))
        .collect();
    let total_topics = topics.len();

    let mut top_opportunities = analyses.clone();
    top_opportunities.sort_by(|a, b| b.opportunity_score.total_cmp(&a.opportunity_score));
    top_opportunities.truncate(TOP_OPPORTUNITIES);

    TrendSummary {
        total_topics,
        active_communities: analyses.len(),
        weekly_growth: weekly_growth(all_posts, now),
        top_opportunities,
        full_analysis: analyses,
        generated_at: now,
    }
}

struct CachedSummary {
    stored_at: Instant,
    summary: Arc<TrendSummary>,
}

/// Fetches hot posts across the configured subreddits and keeps the latest
/// summary in memory for `cache_ttl`.
pub struct TrendAnalyzer {
    source: Arc<dyn RedditSource>,
    db: Database,
    subreddits: Vec<String>,
    cache_ttl: Duration,
    fetch_timeout: Duration,
    cache: RwLock<Option<CachedSummary>>,
}

impl TrendAnalyzer {
    pub fn new(
        source: Arc<dyn RedditSource>,
        db: Database,
        subreddits: Vec<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            source,
            db,
            subreddits,
            cache_ttl,
            fetch_timeout: SUBREDDIT_FETCH_TIMEOUT,
            cache: RwLock::new(None),
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub async fn source_status(&self) -> Option<SourceStatus> {
        self.source.status().await
    }

    /// Cached summary unless it is older than the TTL or `refresh` is set.
    pub async fn summary(&self, refresh: bool) -> Result<Arc<TrendSummary>, CoreError> {
        if !refresh {
            if let Some(cached) = self.cache.read().await.as_ref() {
                if cached.stored_at.elapsed() < self.cache_ttl {
                    debug!("Serving trend summary from cache");
                    return Ok(cached.summary.clone());
                }
            }
        }

        let summary = Arc::new(self.analyze(Utc::now()).await?);
        *self.cache.write().await = Some(CachedSummary {
            stored_at: Instant::now(),
            summary: summary.clone(),
        });
        Ok(summary)
    }

    async fn analyze(&self, now: DateTime<Utc>) -> Result<TrendSummary, CoreError> {
        let fetches = self.subreddits.iter().map(|subreddit| async move {
            let result = timeout(
                self.fetch_timeout,
                self.source.hot_posts(subreddit, HOT_POSTS_PER_SUBREDDIT),
            )
            .await;
            (subreddit, result)
        });

        let mut analyses = Vec::new();
        let mut pain_posts = Vec::new();

        for (subreddit, result) in join_all(fetches).await {
            let posts = match result {
                Ok(Ok(posts)) => posts,
                Ok(Err(e)) => {
                    warn!("Skipping r/{}: {}", subreddit, e);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "Skipping r/{}: no response within {:?}",
                        subreddit, self.fetch_timeout
                    );
                    continue;
                }
            };

            let posts: Vec<RedditPost> = posts.into_iter().map(|p| annotate_post(p, now)).collect();
            pain_posts.extend(posts.iter().filter(|p| is_pain_point(p)).cloned());
            analyses.push(analyze_subreddit(subreddit, &posts));
        }

        if analyses.is_empty() {
            return Err(CoreError::ServiceUnavailable {
                message: ALL_SUBREDDITS_FAILED.to_string(),
            });
        }

        if let Err(e) = self.db.upsert_posts(&pain_posts).await {
            warn!("Failed to persist {} pain-point posts: {}", pain_posts.len(), e);
        }

        info!(
            "Analyzed {} of {} subreddits, {} pain-point posts",
            analyses.len(),
            self.subreddits.len(),
            pain_posts.len()
        );
        Ok(summarize(analyses, &pain_posts, now))
    }
}
