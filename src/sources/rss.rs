// src/sources/rss.rs
//! RSS feed fetcher.
//!
//! Feeds can re-issue an entry under a fresh GUID, so the item id is
//! derived from the title hash instead; content-level dedup in the store
//! catches the rest. Source tags look like `rss_arstechnica_com`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::warn;

use crate::model::{content_fingerprint, CandidateItem};
use crate::sources::{sanitize_html, RateGate, SourceFetcher, DEFAULT_FETCH_TIMEOUT};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

pub struct RssFetcher {
    urls: Vec<String>,
    client: reqwest::Client,
    gate: RateGate,
    user_agent: String,
}

impl RssFetcher {
    pub fn new(urls: Vec<String>, min_interval: std::time::Duration, user_agent: &str) -> Self {
        Self {
            urls,
            client: reqwest::Client::new(),
            gate: RateGate::new(min_interval),
            user_agent: user_agent.to_string(),
        }
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<CandidateItem>> {
        self.gate.wait().await;
        let resp = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/rss+xml, application/xml, text/xml")
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("rss get {url}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("rss feed {url} returned {}", resp.status());
        }
        let body = resp.text().await.with_context(|| format!("rss body {url}"))?;
        parse_feed(&body, url)
    }
}

#[async_trait::async_trait]
impl SourceFetcher for RssFetcher {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        for url in &self.urls {
            // One broken feed only costs its own items.
            match self.fetch_feed(url).await {
                Ok(mut v) => items.append(&mut v),
                Err(e) => warn!(url = %url, error = ?e, "rss feed error"),
            }
        }
        items.truncate(limit);
        Ok(items)
    }

    fn name(&self) -> &str {
        "rss"
    }
}

/// Parse an RSS document into candidates. Entries without a title are
/// dropped; an unparsable `pubDate` falls back to now, in UTC.
pub fn parse_feed(xml: &str, feed_url: &str) -> Result<Vec<CandidateItem>> {
    let rss: Rss = from_str(xml).context("parsing rss xml")?;
    let source = feed_source_name(feed_url);

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = match it.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => sanitize_html(t),
            _ => continue,
        };
        let body = it
            .description
            .as_deref()
            .map(sanitize_html)
            .filter(|b| !b.is_empty());

        out.push(CandidateItem {
            id: format!("{source}_{}", content_fingerprint(&title, None)),
            source: source.clone(),
            title,
            body,
            published_at: it
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822_utc)
                .unwrap_or_else(Utc::now),
            url: it.link.unwrap_or_default(),
            score: 0.0,
        });
    }
    Ok(out)
}

fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(ts, &Rfc2822).ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

/// `https://arstechnica.com/feed/` -> `rss_arstechnica_com`
fn feed_source_name(feed_url: &str) -> String {
    let stripped = feed_url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = stripped.split('/').next().unwrap_or(stripped);
    format!("rss_{}", host.replace('.', "_"))
}
