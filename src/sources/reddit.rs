// src/sources/reddit.rs
//! Reddit subreddit fetcher, against the public `hot.json` listing.
//!
//! Ids are prefixed `reddit_` so they never clash with other sources'
//! ids; the source tag carries the subreddit (`reddit_r_sysadmin`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::model::CandidateItem;
use crate::sources::{RateGate, SourceFetcher, DEFAULT_FETCH_TIMEOUT};

// Reddit caps listing pages at 100; default page size is 25.
const REDDIT_PAGE_CAP: usize = 25;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}
#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}
#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    stickied: bool,
    // Absent on most posts, and explicitly `null` on some non-ads.
    #[serde(default)]
    promoted: Option<bool>,
}

pub struct RedditFetcher {
    subreddits: Vec<String>,
    client: reqwest::Client,
    gate: RateGate,
    user_agent: String,
}

impl RedditFetcher {
    pub fn new(
        subreddits: Vec<String>,
        min_interval: std::time::Duration,
        user_agent: &str,
    ) -> Self {
        Self {
            subreddits,
            client: reqwest::Client::new(),
            gate: RateGate::new(min_interval),
            user_agent: user_agent.to_string(),
        }
    }

    async fn fetch_subreddit(&self, subreddit: &str, limit: usize) -> Result<Vec<CandidateItem>> {
        self.gate.wait().await;
        let url = format!(
            "https://www.reddit.com/r/{subreddit}/hot.json?limit={}",
            limit.min(REDDIT_PAGE_CAP)
        );
        let resp = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("reddit get r/{subreddit}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("reddit returned {} for r/{subreddit}", resp.status());
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("reddit body r/{subreddit}"))?;
        parse_listing(&body, subreddit)
    }
}

#[async_trait::async_trait]
impl SourceFetcher for RedditFetcher {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        for subreddit in &self.subreddits {
            match self.fetch_subreddit(subreddit, limit).await {
                Ok(mut v) => items.append(&mut v),
                Err(e) => warn!(subreddit = %subreddit, error = ?e, "subreddit fetch error"),
            }
        }
        items.truncate(limit);
        Ok(items)
    }

    fn name(&self) -> &str {
        "reddit"
    }
}

/// Parse a `hot.json` listing. Pinned posts and ads are skipped.
pub fn parse_listing(json: &str, subreddit: &str) -> Result<Vec<CandidateItem>> {
    let listing: Listing = serde_json::from_str(json).context("parsing reddit listing")?;

    let mut out = Vec::with_capacity(listing.data.children.len());
    for child in listing.data.children {
        let post = child.data;
        if post.stickied || post.promoted.unwrap_or(false) || post.title.trim().is_empty() {
            continue;
        }
        let body = if post.selftext.trim().is_empty() {
            None
        } else {
            Some(post.selftext.trim().to_string())
        };
        out.push(CandidateItem {
            id: format!("reddit_{}", post.id),
            source: format!("reddit_r_{subreddit}"),
            title: post.title.trim().to_string(),
            body,
            published_at: DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0)
                .unwrap_or_else(Utc::now),
            url: format!("https://reddit.com{}", post.permalink),
            score: 0.0,
        });
    }
    Ok(out)
}
