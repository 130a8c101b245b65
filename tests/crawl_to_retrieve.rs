// tests/crawl_to_retrieve.rs
//
// End-to-end: mock sources -> crawl coordinator -> pipeline -> store ->
// ranked retrieval. Exercises cross-source content dedup and per-source
// failure isolation the way a real poll cycle hits them.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use newswire::classify::MockClassifier;
use newswire::model::CandidateItem;
use newswire::pipeline::IngestPipeline;
use newswire::rank::{rank, RankPolicy, DEFAULT_HALF_LIFE_HOURS};
use newswire::scheduler::run_cycle;
use newswire::sources::{mock::MockFetcher, CrawlCoordinator};
use newswire::store::EventStore;

fn item(id: &str, source: &str, title: &str, hours_old: i64) -> CandidateItem {
    let base = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
    CandidateItem {
        id: id.to_string(),
        source: source.to_string(),
        title: title.to_string(),
        body: Some("details".to_string()),
        published_at: base - Duration::hours(hours_old),
        url: String::new(),
        score: 0.0,
    }
}

#[tokio::test]
async fn full_cycle_dedups_across_sources_and_ranks() {
    // the same story surfaces on two subreddits and one feed
    let reddit_a = MockFetcher::with_items(
        "reddit_a",
        vec![
            item("reddit_one", "reddit_r_sysadmin", "Outage hits database cluster", 1),
            item("reddit_two", "reddit_r_sysadmin", "Unrelated patch notes", 2),
        ],
    );
    let reddit_b = MockFetcher::with_items(
        "reddit_b",
        vec![item("reddit_three", "reddit_r_netsec", "Outage hits database cluster", 1)],
    );
    let rss = MockFetcher::with_items(
        "rss",
        vec![item("rss_one", "rss_arstechnica_com", "Zero-day in the wild", 30)],
    );

    let coordinator =
        CrawlCoordinator::new(vec![Arc::new(reddit_a), Arc::new(reddit_b), Arc::new(rss)]);
    let store = Arc::new(EventStore::in_memory());
    let pipeline = IngestPipeline::new(
        Arc::clone(&store),
        Box::new(MockClassifier::always(true, 0.8)),
    );

    run_cycle(&coordinator, &pipeline, 25).await;

    // 4 candidates, one content duplicate collapsed
    assert_eq!(store.count(), 3);
    let ids: Vec<String> = store.snapshot().iter().map(|e| e.item.id.clone()).collect();
    assert!(!(ids.contains(&"reddit_one".to_string()) && ids.contains(&"reddit_three".to_string())));

    // hybrid ranking puts the 30h-old story behind the fresh ones
    let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
    let mut events = store.snapshot();
    rank(&mut events, RankPolicy::Hybrid, now, DEFAULT_HALF_LIFE_HOURS);
    assert_eq!(events.last().unwrap().item.id, "rss_one");
}

#[tokio::test]
async fn a_dead_source_costs_only_its_own_items() {
    let healthy = MockFetcher::with_items(
        "healthy",
        vec![item("a", "rss_example_com", "Certificate expiry incident", 1)],
    );
    let dead = MockFetcher::failing("dead");

    let coordinator = CrawlCoordinator::new(vec![Arc::new(dead), Arc::new(healthy)]);
    let store = Arc::new(EventStore::in_memory());
    let pipeline = IngestPipeline::new(
        Arc::clone(&store),
        Box::new(MockClassifier::always(true, 0.7)),
    );

    run_cycle(&coordinator, &pipeline, 25).await;
    assert_eq!(store.count(), 1);
    assert_eq!(store.snapshot()[0].item.id, "a");
}

#[tokio::test]
async fn repeated_cycles_converge_instead_of_growing() {
    let fetcher = Arc::new(MockFetcher::with_items(
        "stable",
        vec![
            item("a", "rss_example_com", "Story one", 1),
            item("b", "rss_example_com", "Story two", 2),
        ],
    ));
    let coordinator = CrawlCoordinator::new(vec![fetcher.clone()]);
    let store = Arc::new(EventStore::in_memory());
    let pipeline = IngestPipeline::new(
        Arc::clone(&store),
        Box::new(MockClassifier::always(true, 0.6)),
    );

    for _ in 0..3 {
        run_cycle(&coordinator, &pipeline, 25).await;
    }
    assert_eq!(store.count(), 2);

    // a new upstream item shows up on the next cycle
    fetcher.inject(vec![
        item("a", "rss_example_com", "Story one", 1),
        item("c", "rss_example_com", "Story three", 0),
    ]);
    run_cycle(&coordinator, &pipeline, 25).await;
    assert_eq!(store.count(), 3);
}
