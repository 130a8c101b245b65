// src/app_config.rs
//! Runtime configuration: a TOML file under `config/` with env-var path
//! override, everything defaulted so the service boots with no file at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/newswire.toml";
pub const ENV_CONFIG_PATH: &str = "NEWSWIRE_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub store: StoreCfg,
    #[serde(default)]
    pub scheduler: SchedulerCfg,
    #[serde(default)]
    pub rank: RankCfg,
    #[serde(default)]
    pub sources: SourcesCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerCfg {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreCfg {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerCfg {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_item_limit")]
    pub item_limit_per_source: usize,
    #[serde(default = "default_classify_timeout")]
    pub classify_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankCfg {
    #[serde(default = "default_half_life")]
    pub half_life_hours: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SourcesCfg {
    #[serde(default)]
    pub reddit: Option<RedditCfg>,
    #[serde(default)]
    pub rss: Option<RssCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCfg {
    pub subreddits: Vec<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RssCfg {
    pub urls: Vec<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_port() -> u16 {
    8000
}
fn default_store_path() -> PathBuf {
    PathBuf::from("data/events.json")
}
fn default_poll_interval() -> u64 {
    60
}
fn default_item_limit() -> usize {
    25
}
fn default_classify_timeout() -> u64 {
    60
}
fn default_half_life() -> f64 {
    crate::rank::DEFAULT_HALF_LIFE_HOURS
}
fn default_rate_limit() -> u64 {
    30
}
fn default_user_agent() -> String {
    "newswire/0.1".to_string()
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}
impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}
impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            item_limit_per_source: default_item_limit(),
            classify_timeout_secs: default_classify_timeout(),
        }
    }
}
impl Default for RankCfg {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded app config");
        Ok(cfg)
    }

    /// `$NEWSWIRE_CONFIG_PATH`, then `config/newswire.toml`, then
    /// built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(default);
        }
        Ok(Self::default())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler.classify_timeout_secs)
    }
}
