use crate::parse::{clamp_score, parse_json_reply, strip_code_fences};
use crate::provider::LlmProvider;
use chrono::{DateTime, Utc};
use database::Database;
use painscout_core::{
    ContentKind, CoreError, ErrorExt, GeneratedContent, IdeaValidation, RedditPost, StartupIdea,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const IDEA_SYSTEM: &str = "You turn customer pain points into startup ideas. \
     Reply with a single JSON object and nothing else.";
const VALIDATION_SYSTEM: &str = "You are a skeptical startup analyst. \
     Reply with a single JSON object and nothing else.";
const CONTENT_SYSTEM: &str = "You write concise, concrete marketing copy for early-stage startups.";

#[derive(Debug, Deserialize)]
struct IdeaDraft {
    title: String,
    description: String,
    target_market: String,
    revenue_model: String,
    problem: String,
    solution: String,
}

impl IdeaDraft {
    fn is_complete(&self) -> bool {
        [
            &self.title,
            &self.description,
            &self.target_market,
            &self.revenue_model,
            &self.problem,
            &self.solution,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ValidationDraft {
    market_score: f64,
    competition_score: f64,
    feasibility_score: f64,
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    recommendation: String,
}

fn idea_prompt(post: &RedditPost) -> String {
    format!(
        "Pain point from r/{}:\nTitle: {}\nDetails: {}\n\n\
         Return JSON with keys title, description, target_market, revenue_model, problem, solution.",
        post.subreddit,
        post.title,
        post.content.as_deref().unwrap_or("(none)")
    )
}

fn validation_prompt(idea: &StartupIdea) -> String {
    format!(
        "Idea: {}\nDescription: {}\nProblem: {}\nSolution: {}\nTarget market: {}\n\
         Revenue model: {}\n\nReturn JSON with keys market_score, competition_score, \
         feasibility_score, overall_score (0-100), strengths (array), risks (array), \
         recommendation.",
        idea.title,
        idea.description,
        idea.problem,
        idea.solution,
        idea.target_market,
        idea.revenue_model
    )
}

fn content_prompt(idea: &StartupIdea, kind: ContentKind) -> String {
    let ask = match kind {
        ContentKind::LandingPage => "a landing page with headline, subheadline, three benefits and a call to action",
        ContentKind::TweetThread => "a tweet thread of five tweets",
        ContentKind::Email => "a short cold email to a potential early customer",
        ContentKind::BlogPost => "a blog post of about 600 words",
    };
    format!(
        "Write {} for this startup.\nName: {}\nWhat it does: {}\nFor: {}",
        ask, idea.title, idea.description, idea.target_market
    )
}

/// Idea built from the pain point alone, used when the model reply is
/// unusable.
fn fallback_idea(post: &RedditPost) -> IdeaDraft {
    let problem = post.title.trim().to_string();
    IdeaDraft {
        title: format!("Fix for r/{}: {}", post.subreddit, truncate_words(&problem, 6)),
        description: format!(
            "A focused tool for people in r/{} who keep running into: {}",
            post.subreddit, problem
        ),
        target_market: format!("Members of r/{} and similar communities", post.subreddit),
        revenue_model: "Monthly subscription with a free trial".to_string(),
        problem,
        solution: "A simple product that removes the manual work described in the post"
            .to_string(),
    }
}

/// Heuristic scores from how complete the idea write-up is.
pub fn fallback_validation(idea: &StartupIdea) -> IdeaValidation {
    let words = |s: &str| s.split_whitespace().count() as f64;
    let market = clamp_score(45.0 + words(&idea.target_market).min(10.0) * 3.0);
    let feasibility = clamp_score(50.0 + words(&idea.solution).min(15.0) * 2.0);
    let competition = 50.0;
    let overall = clamp_score((market + feasibility + competition) / 3.0);

    IdeaValidation {
        market_score: market,
        competition_score: competition,
        feasibility_score: feasibility,
        overall_score: overall,
        strengths: vec![format!("Grounded in a real complaint: {}", idea.problem)],
        risks: vec!["Demand is unverified beyond a single discussion".to_string()],
        recommendation: "Talk to ten people with this problem before building.".to_string(),
        fallback: true,
    }
}

pub fn fallback_content(idea: &StartupIdea, kind: ContentKind) -> String {
    match kind {
        ContentKind::LandingPage => format!(
            "# {}\n\n{}\n\nBuilt for {}.\n\n[Join the waitlist]",
            idea.title, idea.description, idea.target_market
        ),
        ContentKind::TweetThread => format!(
            "1/ {}\n\n2/ The problem: {}\n\n3/ Our take: {}\n\n4/ Who it's for: {}\n\n5/ Want early access? Reply below.",
            idea.title, idea.problem, idea.solution, idea.target_market
        ),
        ContentKind::Email => format!(
            "Subject: {}\n\nHi,\n\nI noticed you've dealt with {}. We're building {} to fix that: {}\n\nWould a 15 minute call this week be useful?\n",
            idea.title,
            idea.problem.to_lowercase(),
            idea.title,
            idea.solution
        ),
        ContentKind::BlogPost => format!(
            "# {}\n\n## The problem\n\n{}\n\n## A better way\n\n{}\n\n## Who this is for\n\n{}\n",
            idea.title, idea.problem, idea.solution, idea.target_market
        ),
    }
}

fn truncate_words(text: &str, max: usize) -> String {
    text.split_whitespace().take(max).collect::<Vec<_>>().join(" ")
}

/// AI-backed idea, validation and content generation. Every operation falls
/// back to a heuristic result when the provider fails or replies with
/// something unusable.
pub struct IdeaGenerator {
    provider: Arc<dyn LlmProvider>,
    db: Database,
}

impl IdeaGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, db: Database) -> Self {
        Self { provider, db }
    }

    async fn ask(&self, system: &str, prompt: &str) -> Option<String> {
        match self.provider.complete(system, prompt).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!("{} completion failed, using fallback", self.provider.name());
                e.log_warn();
                None
            }
        }
    }

    pub async fn generate_idea(
        &self,
        user_id: &str,
        pain_point_id: &str,
    ) -> Result<StartupIdea, CoreError> {
        let post = self
            .db
            .get_post(pain_point_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: format!("pain point {}", pain_point_id),
            })?;

        let draft = self
            .ask(IDEA_SYSTEM, &idea_prompt(&post))
            .await
            .and_then(|reply| parse_json_reply::<IdeaDraft>(&reply))
            .filter(IdeaDraft::is_complete);

        let draft = draft.unwrap_or_else(|| {
            info!("Using heuristic idea for pain point {}", pain_point_id);
            fallback_idea(&post)
        });

        let now = Utc::now();
        let idea = StartupIdea {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            pain_point_id: Some(post.id.clone()),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            problem: draft.problem.trim().to_string(),
            solution: draft.solution.trim().to_string(),
            target_market: draft.target_market.trim().to_string(),
            revenue_model: draft.revenue_model.trim().to_string(),
            validation: None,
            created_at: now,
        };
        self.db.insert_idea(&idea).await?;
        self.update_usage(user_id, now).await;
        Ok(idea)
    }

    pub async fn validate_idea(&self, idea_id: &str) -> Result<IdeaValidation, CoreError> {
        let idea = self.load_idea(idea_id).await?;

        let validation = match self
            .ask(VALIDATION_SYSTEM, &validation_prompt(&idea))
            .await
            .and_then(|reply| parse_json_reply::<ValidationDraft>(&reply))
        {
            Some(draft) => {
                let market = clamp_score(draft.market_score);
                let competition = clamp_score(draft.competition_score);
                let feasibility = clamp_score(draft.feasibility_score);
                let overall = draft
                    .overall_score
                    .map(clamp_score)
                    .unwrap_or_else(|| clamp_score((market + competition + feasibility) / 3.0));
                IdeaValidation {
                    market_score: market,
                    competition_score: competition,
                    feasibility_score: feasibility,
                    overall_score: overall,
                    strengths: draft.strengths,
                    risks: draft.risks,
                    recommendation: draft.recommendation,
                    fallback: false,
                }
            }
            None => fallback_validation(&idea),
        };

        self.db.save_idea_validation(&idea.id, &validation).await?;
        Ok(validation)
    }

    pub async fn generate_content(
        &self,
        user_id: &str,
        idea_id: &str,
        kind: ContentKind,
    ) -> Result<GeneratedContent, CoreError> {
        let idea = self.load_idea(idea_id).await?;
        if idea.user_id != user_id {
            return Err(CoreError::NotFound {
                resource: format!("idea {}", idea_id),
            });
        }

        let body = self
            .ask(CONTENT_SYSTEM, &content_prompt(&idea, kind))
            .await
            .map(|reply| strip_code_fences(&reply).to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| fallback_content(&idea, kind));

        let now = Utc::now();
        let content = GeneratedContent {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            idea_id: idea.id,
            kind,
            body,
            created_at: now,
        };
        self.db.insert_content(&content).await?;
        self.update_usage(user_id, now).await;
        Ok(content)
    }

    async fn load_idea(&self, idea_id: &str) -> Result<StartupIdea, CoreError> {
        self.db
            .get_idea(idea_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: format!("idea {}", idea_id),
            })
    }

    async fn update_usage(&self, user_id: &str, now: DateTime<Utc>) {
        if let Err(e) = self.db.reconcile_usage(user_id, now).await {
            warn!("Usage update for {} failed (non-critical): {}", user_id, e);
        }
    }
}
