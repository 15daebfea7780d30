use crate::scoring::{account_age_days, calculate_engagement_score, posting_frequency};
use chrono::{DateTime, Duration, Utc};
use database::Database;
use futures::future::join_all;
use painscout_core::{
    paginate, CoreError, ErrorExt, PageRequest, RedditContact, RedditProfile, EXCLUDED_AUTHORS,
};
use reddit_client::{RedditSource, SourceStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CONTACT_CACHE_HOURS: i64 = 24;
pub const SOURCE_POST_WINDOW_HOURS: i64 = 48;
pub const MAX_SOURCE_POSTS: u32 = 20;

#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub pain_point_id: String,
    pub page: PageRequest,
    /// Usage is reconciled for this user when present.
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactPage {
    pub contacts: Vec<RedditContact>,
    pub page: u32,
    pub limit: u32,
    pub total_found: usize,
    pub total_pages: u32,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ContactPage {
    fn build(contacts: Vec<RedditContact>, request: PageRequest, cached: bool) -> Self {
        let page = paginate(contacts, request);
        Self {
            contacts: page.items,
            page: page.page,
            limit: page.limit,
            total_found: page.total_found,
            total_pages: page.total_pages,
            cached,
            warning: None,
        }
    }
}

/// Turns a fetched profile into a scored contact.
pub fn contact_from_profile(
    pain_point_id: &str,
    profile: &RedditProfile,
    now: DateTime<Utc>,
) -> RedditContact {
    let karma = profile.total_karma();
    let age_days = account_age_days(profile.created_utc, now);
    let frequency = posting_frequency(karma, age_days);

    RedditContact {
        pain_point_id: pain_point_id.to_string(),
        username: profile.username.clone(),
        karma,
        account_age_days: age_days,
        posting_frequency: (frequency * 100.0).round() / 100.0,
        engagement_score: calculate_engagement_score(karma, frequency, age_days),
        discovered_at: now,
    }
}

/// Highest engagement first; ties resolved by username so pages are stable.
pub fn sort_contacts(contacts: &mut [RedditContact]) {
    contacts.sort_by(|a, b| {
        b.engagement_score
            .total_cmp(&a.engagement_score)
            .then_with(|| a.username.cmp(&b.username))
    });
}

/// Unique post authors in first-seen order, without deleted or bot accounts.
pub fn candidate_authors<'a>(authors: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    authors
        .into_iter()
        .filter(|a| !a.is_empty() && !EXCLUDED_AUTHORS.contains(a))
        .filter(|a| seen.insert(*a))
        .map(str::to_string)
        .collect()
}

pub struct ContactDiscovery {
    source: Arc<dyn RedditSource>,
    db: Database,
}

impl ContactDiscovery {
    pub fn new(source: Arc<dyn RedditSource>, db: Database) -> Self {
        Self { source, db }
    }

    pub async fn source_status(&self) -> Option<SourceStatus> {
        self.source.status().await
    }

    pub async fn discover(&self, request: &DiscoveryRequest) -> Result<ContactPage, CoreError> {
        self.discover_at(request, Utc::now()).await
    }

    pub async fn discover_at(
        &self,
        request: &DiscoveryRequest,
        now: DateTime<Utc>,
    ) -> Result<ContactPage, CoreError> {
        let pain_point = self
            .db
            .get_post(&request.pain_point_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: format!("pain point {}", request.pain_point_id),
            })?;

        let fresh_since = now - Duration::hours(CONTACT_CACHE_HOURS);
        let cached = self
            .db
            .fresh_contacts(&pain_point.id, fresh_since)
            .await?;
        if !cached.is_empty() {
            debug!(
                "Serving {} cached contacts for {}",
                cached.len(),
                pain_point.id
            );
            return Ok(ContactPage::build(cached, request.page, true));
        }

        let posts = self
            .db
            .recent_posts_in_subreddit(
                &pain_point.subreddit,
                now - Duration::hours(SOURCE_POST_WINDOW_HOURS),
                MAX_SOURCE_POSTS,
            )
            .await?;
        let authors = candidate_authors(posts.iter().map(|p| p.author.as_str()));
        info!(
            "Discovering contacts for {} from {} authors in r/{}",
            pain_point.id,
            authors.len(),
            pain_point.subreddit
        );

        // Pacing comes from the rate limiter shared by the Reddit client.
        let lookups = authors
            .iter()
            .map(|author| async move { (author, self.source.user_profile(author).await) });

        let mut contacts: Vec<RedditContact> = Vec::with_capacity(authors.len());
        for (author, result) in join_all(lookups).await {
            match result {
                Ok(profile) => contacts.push(contact_from_profile(&pain_point.id, &profile, now)),
                Err(e) if e.is_retryable() => {
                    warn!("Skipping u/{} after retries", author);
                    e.log_warn();
                }
                Err(e) => debug!("Skipping u/{}: {}", author, e),
            }
        }
        sort_contacts(&mut contacts);

        let mut warning = None;
        if let Err(e) = self
            .db
            .record_contacts(&pain_point.id, &contacts, request.user_id.as_deref())
            .await
        {
            warn!("Failed to cache contacts for {}: {}", pain_point.id, e);
            warning = Some(format!(
                "Contacts were discovered but could not be cached: {}",
                e
            ));
        } else if let Some(user_id) = request.user_id.as_deref() {
            if let Err(e) = self.db.reconcile_usage(user_id, now).await {
                warn!("Usage update for {} failed (non-critical): {}", user_id, e);
            }
        }

        let mut page = ContactPage::build(contacts, request.page, false);
        page.warning = warning;
        Ok(page)
    }
}
