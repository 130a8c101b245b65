// tests/store_persistence.rs
//
// Durability behavior of the event store: reopening a store sees the
// previously accepted events, both uniqueness indexes survive the
// round-trip, and clear-all persists the empty log.

use chrono::{TimeZone, Utc};
use newswire::model::CandidateItem;
use newswire::store::{EventStore, QueryOptions, SortField};

fn item(id: &str, source: &str, title: &str, score: f64) -> CandidateItem {
    CandidateItem {
        id: id.to_string(),
        source: source.to_string(),
        title: title.to_string(),
        body: Some("body text".to_string()),
        published_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
        url: String::new(),
        score,
    }
}

#[test]
fn reopened_store_keeps_events_and_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");

    {
        let store = EventStore::open(&path).unwrap();
        let report = store
            .insert_batch(vec![
                item("a", "s1", "first title", 0.9),
                item("b", "s2", "second title", 0.4),
            ])
            .unwrap();
        assert_eq!(report.added, 2);
    }

    let reopened = EventStore::open(&path).unwrap();
    assert_eq!(reopened.count(), 2);
    assert!(reopened.exists_by_id("a"));

    // id index survived: same id is a duplicate, not a new row
    let dup = reopened.insert_batch(vec![item("a", "s1", "first title", 0.9)]);
    assert_eq!(dup.unwrap().duplicate_by_id, 1);

    // fingerprint index survived: same content under a new id collapses
    let content_dup = reopened.insert_batch(vec![item("c", "s3", "second title", 0.4)]);
    assert_eq!(content_dup.unwrap().duplicate_by_content, 1);
    assert_eq!(reopened.count(), 2);
}

#[test]
fn ingested_at_is_frozen_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");

    let first_ingested_at = {
        let store = EventStore::open(&path).unwrap();
        store
            .insert_batch(vec![item("a", "s1", "title", 0.5)])
            .unwrap();
        store.snapshot()[0].ingested_at
    };

    let reopened = EventStore::open(&path).unwrap();
    assert_eq!(reopened.snapshot()[0].ingested_at, first_ingested_at);
}

#[test]
fn clear_all_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");

    {
        let store = EventStore::open(&path).unwrap();
        store
            .insert_batch(vec![item("a", "s1", "t1", 0.5), item("b", "s2", "t2", 0.5)])
            .unwrap();
        assert_eq!(store.clear_all().unwrap(), 2);
    }

    let reopened = EventStore::open(&path).unwrap();
    assert_eq!(reopened.count(), 0);
}

#[test]
fn failed_persist_rolls_the_whole_batch_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    let store = EventStore::open(&path).unwrap();
    store
        .insert_batch(vec![item("a", "s1", "first title", 0.9)])
        .unwrap();

    // a directory squatting on the temp-file path makes the next write fail
    let tmp = dir.path().join("events.json.tmp");
    std::fs::create_dir(&tmp).unwrap();
    let failed = store.insert_batch(vec![
        item("b", "s1", "second title", 0.4),
        item("c", "s2", "third title", 0.5),
    ]);
    assert!(failed.is_err());

    // neither the events nor their index entries survived the failure
    assert_eq!(store.count(), 1);
    assert!(!store.exists_by_id("b"));
    assert!(!store.exists_by_id("c"));

    // once unblocked, the exact same batch goes in cleanly
    std::fs::remove_dir(&tmp).unwrap();
    let retried = store
        .insert_batch(vec![
            item("b", "s1", "second title", 0.4),
            item("c", "s2", "third title", 0.5),
        ])
        .unwrap();
    assert_eq!(retried.added, 2);
    assert_eq!(retried.duplicate_by_id, 0);
    assert_eq!(retried.duplicate_by_content, 0);

    drop(store);
    let reopened = EventStore::open(&path).unwrap();
    assert_eq!(reopened.count(), 3);
}

#[test]
fn failed_persist_leaves_clear_all_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    let store = EventStore::open(&path).unwrap();
    store
        .insert_batch(vec![item("a", "s1", "t1", 0.5), item("b", "s2", "t2", 0.5)])
        .unwrap();

    std::fs::create_dir(dir.path().join("events.json.tmp")).unwrap();
    assert!(store.clear_all().is_err());

    // the previous state was restored, indexes included
    assert_eq!(store.count(), 2);
    assert!(store.exists_by_id("a"));
    let dup = store.insert_batch(vec![item("a", "s1", "t1", 0.5)]);
    assert_eq!(dup.unwrap().duplicate_by_id, 1);
}

#[test]
fn query_by_ingested_at_orders_by_acceptance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    let store = EventStore::open(&path).unwrap();

    store.insert_batch(vec![item("a", "s1", "t1", 0.5)]).unwrap();
    store.insert_batch(vec![item("b", "s1", "t2", 0.5)]).unwrap();

    let newest_first = store.query(&QueryOptions {
        sort: SortField::IngestedAt,
        descending: true,
        limit: Some(1),
        source_filter: None,
    });
    assert_eq!(newest_first.len(), 1);
    assert_eq!(newest_first[0].item.id, "b");
}
