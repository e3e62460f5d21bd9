// tests/pipeline_cycle.rs
//
// End-to-end fetch cycles against scripted retrievers and in-memory stores.
//
// Covered:
// - fan-out/fan-in with one failing source
// - per-category top-5, ranks, near-duplicate removal
// - re-running a date replaces its digest
// - per-article insert failures vs. an unavailable store
// - shared deadline: stragglers abandoned, total timeout fails the cycle
// - one cycle at a time

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ai_news_digest::error::{CycleError, StoreError};
use ai_news_digest::feeds::Category;
use ai_news_digest::pipeline::CycleState;
use ai_news_digest::store::{MemoryStore, NewsStore};

use common::*;

const DATE: &str = "2025-06-10";

#[tokio::test]
async fn cycle_selects_top_five_per_category_and_persists_ranks() {
    let (feeds, stub) = standard_setup();
    let store = Arc::new(MemoryStore::new());
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let report = p.run_fetch_cycle(DATE).await.expect("cycle ok");

    assert_eq!(report.sources_launched, 3);
    assert_eq!(report.sources_completed, 3);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.sources_timed_out, 0);
    assert_eq!(report.articles_fetched, 11);
    assert_eq!(report.duplicates_dropped, 1);
    assert_eq!(report.domestic_selected, 5);
    assert_eq!(report.global_selected, 3);
    assert_eq!(report.inserted, 8);
    assert_eq!(report.insert_errors, 0);
    assert_eq!(p.state(), CycleState::Idle);

    let rows = store.articles_for_date(DATE).await.unwrap();
    let domestic: Vec<_> = rows
        .iter()
        .filter(|r| r.category == Category::Domestic)
        .map(|r| (r.rank, r.title.as_str()))
        .collect();
    assert_eq!(
        domestic,
        vec![
            (1, "Domestic story 1"),
            (2, "Domestic story 2"),
            (3, "Domestic story 3"),
            (4, "Domestic story 4"),
            (5, "Domestic story 5"),
        ]
    );

    let global: Vec<_> = rows
        .iter()
        .filter(|r| r.category == Category::Global)
        .map(|r| r.rank)
        .collect();
    assert_eq!(global, vec![1, 2, 3]);
    assert!(rows.iter().all(|r| r.publish_date == DATE));
    assert!(rows.iter().all(|r| r.source_name == "cn.example" || r.source_name == "news.example"));
}

#[tokio::test]
async fn two_domestic_feeds_and_one_broken_source() {
    let second_url = "https://cn-two.example/feed";
    let feeds = vec![
        feed("CN Example", DOMESTIC_URL, Category::Domestic),
        feed("CN Two", second_url, Category::Domestic),
        feed("Broken", BROKEN_URL, Category::Domestic),
    ];
    let extra: Vec<_> = (1..=3)
        .map(|i| article(&format!("Second feed item {i}"), "cn-two.example", Category::Domestic, 10 + i))
        .collect();
    let stub = StubRetriever::new()
        .on(DOMESTIC_URL, Behavior::Articles(domestic_batch()))
        .on(second_url, Behavior::Articles(extra))
        .on(BROKEN_URL, Behavior::Network);
    let store = Arc::new(MemoryStore::new());
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let report = p.run_fetch_cycle(DATE).await.expect("cycle ok");
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.domestic_selected, 5);
    assert_eq!(report.global_selected, 0);

    let ranks: Vec<u32> = store
        .articles_for_date(DATE)
        .await
        .unwrap()
        .iter()
        .map(|r| r.rank)
        .collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn rerun_for_same_date_replaces_previous_digest() {
    let (feeds, stub) = standard_setup();
    let store = Arc::new(MemoryStore::new());
    store
        .insert_article(&seeded("2025-06-09", Category::Global, 1, "yesterday"))
        .await
        .unwrap();
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let first = p.run_fetch_cycle(DATE).await.unwrap();
    let second = p.run_fetch_cycle(DATE).await.unwrap();

    assert_eq!(first.deleted, 0);
    assert_eq!(second.deleted, 8);
    assert_eq!(store.articles_for_date(DATE).await.unwrap().len(), 8);
    // Other dates are untouched.
    assert_eq!(store.articles_for_date("2025-06-09").await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_registry_stores_nothing_and_succeeds() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline_with(Vec::new(), Arc::new(StubRetriever::new()), store.clone());

    let report = p.run_fetch_cycle(DATE).await.expect("empty cycle ok");
    assert_eq!(report.sources_launched, 0);
    assert_eq!(report.inserted, 0);
    assert!(!store.has_articles_for_date(DATE).await.unwrap());
}

#[tokio::test]
async fn all_sources_failing_fast_still_clears_the_date() {
    let feeds = vec![feed("Broken", BROKEN_URL, Category::Global)];
    let store = Arc::new(MemoryStore::new());
    store
        .insert_article(&seeded(DATE, Category::Global, 1, "stale"))
        .await
        .unwrap();
    let p = pipeline_with(feeds, Arc::new(StubRetriever::new()), store.clone());

    let report = p.run_fetch_cycle(DATE).await.expect("failures are per-source");
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.deleted, 1);
    assert!(!store.has_articles_for_date(DATE).await.unwrap());
}

#[tokio::test]
async fn top_n_is_configurable() {
    let (feeds, stub) = standard_setup();
    let store = Arc::new(MemoryStore::new());
    let p = pipeline_with(feeds, Arc::new(stub), store.clone()).with_top_n(2);

    let report = p.run_fetch_cycle(DATE).await.unwrap();
    assert_eq!(report.domestic_selected, 2);
    assert_eq!(report.global_selected, 2);
    assert_eq!(store.articles_for_date(DATE).await.unwrap().len(), 4);
}

#[tokio::test]
async fn single_insert_failure_does_not_stop_the_rest() {
    let feeds = vec![feed("News Example", GLOBAL_URL, Category::Global)];
    let mut batch = global_batch();
    batch.push(article("Global poison story", "news.example", Category::Global, 0));
    let stub = StubRetriever::new().on(GLOBAL_URL, Behavior::Articles(batch));
    let store = Arc::new(FlakyStore::new(Fault::PoisonTitles));
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let report = p.run_fetch_cycle(DATE).await.expect("cycle ok");
    assert_eq!(report.insert_errors, 1);
    assert_eq!(report.inserted, 3);
    assert_eq!(store.insert_attempts.load(Ordering::SeqCst), 4);

    // Ranks follow the selected order, so the failed rank 1 leaves a gap.
    let ranks: Vec<u32> = store
        .articles_for_date(DATE)
        .await
        .unwrap()
        .iter()
        .map(|r| r.rank)
        .collect();
    assert_eq!(ranks, vec![2, 3, 4]);
}

#[tokio::test]
async fn unavailable_store_aborts_persistence() {
    let (feeds, stub) = standard_setup();
    let store = Arc::new(FlakyStore::new(Fault::InsertUnavailable));
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let err = p.run_fetch_cycle(DATE).await.expect_err("store down");
    assert!(matches!(err, CycleError::Store(StoreError::Unavailable(_))));
    assert_eq!(store.insert_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(p.state(), CycleState::Idle);
}

#[tokio::test]
async fn delete_failure_is_a_cycle_error() {
    let (feeds, stub) = standard_setup();
    let store = Arc::new(FlakyStore::new(Fault::DeleteFails));
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let err = p.run_fetch_cycle(DATE).await.expect_err("delete refused");
    assert!(matches!(err, CycleError::Store(StoreError::Backend(_))));
    assert_eq!(store.insert_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn stragglers_are_abandoned_at_the_deadline() {
    let slow_url = "https://slow.example/feed";
    let hang_url = "https://hang.example/feed";
    let feeds = vec![
        feed("News Example", GLOBAL_URL, Category::Global),
        feed("Slow", slow_url, Category::Global),
        feed("Hang", hang_url, Category::Global),
    ];
    let stub = StubRetriever::new()
        .on(GLOBAL_URL, Behavior::Articles(global_batch()))
        .on(
            slow_url,
            Behavior::Delayed(
                Duration::from_secs(5),
                vec![article("Slow but in time", "slow.example", Category::Global, 0)],
            ),
        )
        .on(hang_url, Behavior::Hang);
    let store = Arc::new(MemoryStore::new());
    let p = pipeline_with(feeds, Arc::new(stub), store.clone())
        .with_deadline(Duration::from_secs(60));

    let started = tokio::time::Instant::now();
    let report = p.run_fetch_cycle(DATE).await.expect("partial results are fine");

    assert_eq!(report.sources_completed, 2);
    assert_eq!(report.sources_timed_out, 1);
    assert_eq!(report.inserted, 4);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn total_timeout_fails_the_cycle_and_keeps_stored_data() {
    let feeds = vec![
        feed("Hang", "https://hang.example/feed", Category::Global),
        feed("Deadline", "https://deadline.example/feed", Category::Domestic),
    ];
    let stub = StubRetriever::new()
        .on("https://hang.example/feed", Behavior::Hang)
        .on("https://deadline.example/feed", Behavior::Deadline);
    let store = Arc::new(MemoryStore::new());
    store
        .insert_article(&seeded(DATE, Category::Global, 1, "keep me"))
        .await
        .unwrap();
    let p = pipeline_with(feeds, Arc::new(stub), store.clone());

    let err = p.run_fetch_cycle(DATE).await.expect_err("nothing completed");
    assert!(matches!(err, CycleError::AllSourcesTimedOut { launched: 2 }));
    assert_eq!(p.state(), CycleState::Failed);
    assert_eq!(store.articles_for_date(DATE).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_triggers_run_one_cycle_at_a_time() {
    let feeds = vec![feed("News Example", GLOBAL_URL, Category::Global)];
    let stub = Arc::new(
        StubRetriever::new().on(GLOBAL_URL, Behavior::Delayed(Duration::from_secs(3), global_batch())),
    );
    let store = Arc::new(MemoryStore::new());
    let p = Arc::new(pipeline_with(feeds, stub.clone(), store.clone()));

    let (a, b) = tokio::join!(p.run_fetch_cycle(DATE), p.run_fetch_cycle(DATE));
    assert!(a.is_ok() && b.is_ok());

    assert_eq!(stub.calls(), 2);
    assert_eq!(stub.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(store.articles_for_date(DATE).await.unwrap().len(), 3);
}
