//! Pain-point discovery: subreddit trend analysis and contact discovery on
//! top of a [`reddit_client::RedditSource`].

pub mod contacts;
pub mod scoring;
pub mod trends;


pub use contacts::{ContactDiscovery, ContactPage, DiscoveryRequest};
pub use trends::{SubredditAnalysis, TrendAnalyzer, TrendSummary};
