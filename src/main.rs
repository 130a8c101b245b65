//! Newswire — Binary Entrypoint
//! Boots the Axum HTTP server and the background crawl scheduler, wiring
//! store, classifier, pipeline, and sources from config.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newswire::api::{create_router, AppState};
use newswire::app_config::AppConfig;
use newswire::classify::KeywordClassifier;
use newswire::metrics::{install_prometheus, metrics_router};
use newswire::pipeline::IngestPipeline;
use newswire::scheduler::spawn_poll_loop;
use newswire::sources::{
    reddit::RedditFetcher, rss::RssFetcher, CrawlCoordinator, SourceFetcher,
};
use newswire::store::EventStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newswire=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_fetchers(cfg: &AppConfig) -> Vec<Arc<dyn SourceFetcher>> {
    let mut fetchers: Vec<Arc<dyn SourceFetcher>> = Vec::new();
    if let Some(reddit) = &cfg.sources.reddit {
        fetchers.push(Arc::new(RedditFetcher::new(
            reddit.subreddits.clone(),
            Duration::from_secs(reddit.rate_limit_secs),
            &reddit.user_agent,
        )));
    }
    if let Some(rss) = &cfg.sources.rss {
        fetchers.push(Arc::new(RssFetcher::new(
            rss.urls.clone(),
            Duration::from_secs(rss.rate_limit_secs),
            &rss.user_agent,
        )));
    }
    fetchers
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let prometheus = install_prometheus();

    let store = Arc::new(EventStore::open(&cfg.store.path)?);
    let classifier = KeywordClassifier::from_toml()?;
    let pipeline = Arc::new(
        IngestPipeline::new(Arc::clone(&store), Box::new(classifier))
            .with_classify_timeout(cfg.classify_timeout()),
    );

    let fetchers = build_fetchers(&cfg);
    let coordinator = Arc::new(CrawlCoordinator::new(fetchers));
    if coordinator.source_count() > 0 {
        spawn_poll_loop(
            Arc::clone(&coordinator),
            Arc::clone(&pipeline),
            cfg.poll_interval(),
            cfg.scheduler.item_limit_per_source,
        );
    } else {
        tracing::warn!("no sources configured; only the HTTP ingest path is active");
    }

    let state = AppState {
        store,
        pipeline,
        half_life_hours: cfg.rank.half_life_hours,
    };
    let router = create_router(state).merge(metrics_router(prometheus));

    let addr = format!("0.0.0.0:{}", cfg.server.port);
    tracing::info!(%addr, "newswire listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
