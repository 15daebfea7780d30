//! Heuristic scores for posts, subreddits and contacts.
//!
//! Everything here is pure; callers pass `now` so results are reproducible.

use chrono::{DateTime, Utc};
use painscout_core::{RedditPost, TrendDirection};
use std::collections::HashMap;

/// Phrases that mark a post as describing a problem.
pub const PAIN_KEYWORDS: &[&str] = &[
    "struggling",
    "frustrat",
    "hate",
    "annoying",
    "problem",
    "issue",
    "pain",
    "difficult",
    "wish there was",
    "looking for a tool",
    "is there a tool",
    "need help",
    "how do i",
    "tired of",
    "waste of time",
    "too expensive",
    "can't find",
];

/// Topics counted by [`extract_trending_topics`].
pub const TOPIC_VOCABULARY: &[&str] = &[
    "saas",
    "ai",
    "automation",
    "marketing",
    "productivity",
    "remote",
    "ecommerce",
    "fintech",
    "no-code",
    "analytics",
    "crm",
    "invoicing",
    "hiring",
    "pricing",
    "seo",
    "customer support",
    "onboarding",
    "scheduling",
];

const POSITIVE_STEMS: &[&str] = &[
    "love", "great", "awesome", "amazing", "excellent", "happy", "helpful", "easy", "success",
    "recommend", "good", "best", "enjoy", "thank",
];

const NEGATIVE_STEMS: &[&str] = &[
    "hate", "terrible", "awful", "frustrat", "annoy", "difficult", "problem", "broken", "slow",
    "expensive", "confus", "struggl", "fail", "bad", "worst", "painful",
];

pub const TOP_TOPICS: usize = 5;
pub const MIN_SCORE_WITHOUT_KEYWORD: i64 = 20;
pub const ENGAGEMENT_SCORE_CAP: f64 = 999.99;

/// Velocity (score per hour) at or above which a post is rising.
const RISING_VELOCITY: f64 = 10.0;
const DECLINING_VELOCITY: f64 = 1.0;

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

pub fn is_pain_point(post: &RedditPost) -> bool {
    let text = post.full_text().to_lowercase();
    PAIN_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Posts worth analyzing: a pain keyword, or enough score to matter anyway.
pub fn keep_for_analysis(post: &RedditPost) -> bool {
    is_pain_point(post) || post.score > MIN_SCORE_WITHOUT_KEYWORD
}

/// Counts vocabulary hits across the posts and returns the five most
/// frequent, ties broken by vocabulary order.
pub fn extract_trending_topics(posts: &[RedditPost]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for post in posts {
        let text = post.full_text().to_lowercase();
        let tokens: Vec<String> = words(&text).collect();
        for topic in TOPIC_VOCABULARY {
            let hits = if topic.contains(' ') {
                text.matches(topic).count()
            } else {
                tokens.iter().filter(|w| w.as_str() == *topic).count()
            };
            if hits > 0 {
                *counts.entry(*topic).or_default() += hits;
            }
        }
    }

    let mut ranked: Vec<(usize, &str)> = TOPIC_VOCABULARY
        .iter()
        .enumerate()
        .filter_map(|(order, topic)| counts.get(topic).map(|_| (order, *topic)))
        .collect();
    ranked.sort_by(|a, b| counts[b.1].cmp(&counts[a.1]).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(TOP_TOPICS)
        .map(|(_, topic)| topic.to_string())
        .collect()
}

/// `50 + (positive - negative) / words * 1000`, clamped to [0, 100].
pub fn calculate_sentiment_score(text: &str) -> f64 {
    let mut total = 0usize;
    let mut positive = 0i64;
    let mut negative = 0i64;

    for word in words(text) {
        total += 1;
        if POSITIVE_STEMS.iter().any(|s| word.starts_with(s)) {
            positive += 1;
        }
        if NEGATIVE_STEMS.iter().any(|s| word.starts_with(s)) {
            negative += 1;
        }
    }

    if total == 0 {
        return 50.0;
    }
    (50.0 + (positive - negative) as f64 / total as f64 * 1000.0).clamp(0.0, 100.0)
}

/// Share of posts that read as pain points, as a percentage.
pub fn problem_keyword_density(posts: &[RedditPost]) -> f64 {
    if posts.is_empty() {
        return 0.0;
    }
    let pain = posts.iter().filter(|p| is_pain_point(p)).count();
    pain as f64 / posts.len() as f64 * 100.0
}

pub fn calculate_opportunity_score(avg_score: f64, avg_comments: f64, density: f64) -> f64 {
    let part = |value: f64, divisor: f64, cap: f64| (value.max(0.0) / divisor).min(cap);
    let total =
        part(avg_score, 10.0, 40.0) + part(avg_comments, 2.0, 30.0) + part(density, 1.0, 30.0);
    total.clamp(0.0, 100.0)
}

/// Whole days since `created_utc`, never less than one.
pub fn account_age_days(created_utc: i64, now: DateTime<Utc>) -> i64 {
    ((now.timestamp() - created_utc) / 86_400).max(1)
}

/// Karma earned per week, as `(karma / 10) / weeks`.
pub fn posting_frequency(karma: i64, account_age_days: i64) -> f64 {
    let weeks = account_age_days.max(1) as f64 / 7.0;
    (karma as f64 / 10.0) / weeks
}

pub fn calculate_engagement_score(karma: i64, posting_frequency: f64, account_age_days: i64) -> f64 {
    let raw = karma as f64 * 0.3
        + posting_frequency * 0.5
        + (1.0 / account_age_days.max(1) as f64) * 0.2;
    let rounded = (raw * 100.0).round() / 100.0;
    rounded.clamp(0.0, ENGAGEMENT_SCORE_CAP)
}

fn age_hours(post: &RedditPost, now: DateTime<Utc>) -> f64 {
    (now.timestamp() - post.created_utc) as f64 / 3600.0
}

pub fn trend_direction(post: &RedditPost, now: DateTime<Utc>) -> TrendDirection {
    let age = age_hours(post, now);
    let velocity = post.score as f64 / age.max(1.0);
    if velocity >= RISING_VELOCITY {
        TrendDirection::Rising
    } else if velocity < DECLINING_VELOCITY && age > 24.0 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

pub fn is_emerging(post: &RedditPost, now: DateTime<Utc>) -> bool {
    age_hours(post, now) <= 24.0 && post.num_comments >= 5
}

/// Fills in the derived fields stored alongside a post.
pub fn annotate_post(mut post: RedditPost, now: DateTime<Utc>) -> RedditPost {
    let density = if is_pain_point(&post) { 100.0 } else { 0.0 };
    post.viability_score =
        calculate_opportunity_score(post.score as f64, post.num_comments as f64, density);
    post.trend_direction = trend_direction(&post, now);
    post.is_emerging = is_emerging(&post, now);
    post
}

/// Percent change in pain-point posts between the latest 3.5 days and the
/// 3.5 days before. The earlier half counts as at least one post; no pain
/// posts in either half is 0.
pub fn weekly_growth(posts: &[RedditPost], now: DateTime<Utc>) -> f64 {
    const HALF_WEEK_SECS: i64 = 7 * 86_400 / 2;
    let now_ts = now.timestamp();

    let (mut recent, mut previous) = (0usize, 0usize);
    for post in posts.iter().filter(|p| is_pain_point(p)) {
        let age = now_ts - post.created_utc;
        if (0..HALF_WEEK_SECS).contains(&age) {
            recent += 1;
        } else if (HALF_WEEK_SECS..2 * HALF_WEEK_SECS).contains(&age) {
            previous += 1;
        }
    }

    if recent == 0 && previous == 0 {
        return 0.0;
    }
    let previous = previous.max(1) as f64;
    let growth = (recent as f64 - previous) / previous * 100.0;
    (growth * 10.0).round() / 10.0
}
