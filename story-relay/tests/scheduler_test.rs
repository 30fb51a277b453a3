mod common;

use common::*;
use interfaces::RecordStore;
use std::sync::Arc;
use std::time::Duration;
use story_relay::types::*;
use story_relay::{IngestionPipeline, PipelineConfig, Publisher, RelayInstance, ReleaseQueue, Scheduler};
use tokio::sync::Notify;
use tokio_test::assert_ok;
use tracing::info;

fn instance(source: ScriptedSource, store: &RecordStore, poster: Arc<RecordingPoster>) -> RelayInstance {
    let (_llm, enricher) = mock_enricher();
    let pipeline = IngestionPipeline::new(Arc::new(source), store.clone(), enricher, PipelineConfig::default());
    RelayInstance::new(pipeline, ReleaseQueue::new(store.clone()), Publisher::new(poster))
}

#[tokio::test]
async fn test_tick_publishes_exactly_one_record_oldest_first() -> Result<()> {
    init_tracing();
    info!("Testing one release per tick");

    let store = RecordStore::in_memory().await?;
    let source = ScriptedSource::new("Hacker News")
        .with_candidates(&[1, 2, 3])
        .with_story(1, "One", &["a"])
        .with_story(2, "Two", &["b"])
        .with_story(3, "Three", &["c"]);
    let poster = Arc::new(RecordingPoster::default());
    let relay = instance(source, &store, poster.clone());

    let summary = relay.run_tick().await.expect("tick ran");
    assert_eq!(summary.ingestion.persisted.len(), 3);
    let released = summary.released.expect("one record released");
    assert_eq!(released.external_id, ExternalId::from(1));
    assert!(summary.publish_error.is_none());

    let posts = poster.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].starts_with("One\n\n💬 "));
    assert!(posts[0].ends_with("\n\nhttps://example.com/1"));

    let stats = store.stats().await?;
    assert_eq!((stats.total, stats.published, stats.pending), (3, 1, 2));

    relay.run_tick().await.expect("tick ran");
    relay.run_tick().await.expect("tick ran");
    let summary = relay.run_tick().await.expect("tick ran");
    assert!(summary.released.is_none());
    assert_eq!(poster.posts().len(), 3);
    assert!(poster.posts()[2].starts_with("Three\n\n"));

    Ok(())
}

#[tokio::test]
async fn test_failed_post_leaves_record_published() -> Result<()> {
    init_tracing();

    let store = RecordStore::in_memory().await?;
    seed(&store, 50, "Doomed").await?;
    seed(&store, 51, "Next").await?;
    let poster = Arc::new(RecordingPoster::failing());
    let relay = instance(ScriptedSource::new("Reddit"), &store, poster.clone());

    let summary = relay.run_tick().await.expect("tick ran");
    assert_eq!(summary.released.map(|r| r.external_id), Some(ExternalId::from(50)));
    assert!(summary.publish_error.unwrap_or_default().contains("502"));

    let record = store.get(&ExternalId::from(50)).await?.expect("record 50");
    assert!(record.published);

    // The failed record is not offered again
    let summary = relay.run_tick().await.expect("tick ran");
    assert_eq!(summary.released.map(|r| r.external_id), Some(ExternalId::from(51)));
    assert_eq!(poster.posts().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() -> Result<()> {
    init_tracing();

    let store = RecordStore::in_memory().await?;
    seed(&store, 60, "Pending").await?;
    let gate = Arc::new(Notify::new());
    let mut source = ScriptedSource::new("Hacker News");
    source.gate = Some(gate.clone());
    let poster = Arc::new(RecordingPoster::default());
    let relay = Arc::new(instance(source, &store, poster.clone()));

    let running = tokio::spawn({
        let relay = relay.clone();
        async move { relay.run_tick().await }
    });

    assert_ok!(
        tokio::time::timeout(Duration::from_secs(5), async {
            while !relay.is_in_flight() {
                tokio::task::yield_now().await;
            }
        })
        .await
    );

    assert!(relay.run_tick().await.is_none());
    assert!(poster.posts().is_empty());

    gate.notify_one();
    let summary = running.await.expect("tick task").expect("first tick ran");
    assert_eq!(summary.released.map(|r| r.external_id), Some(ExternalId::from(60)));
    assert!(!relay.is_in_flight());
    assert_eq!(poster.posts().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_instances_are_independent() -> Result<()> {
    init_tracing();

    let hn_store = RecordStore::in_memory().await?;
    let reddit_store = RecordStore::in_memory().await?;
    let hn_poster = Arc::new(RecordingPoster::default());
    let reddit_poster = Arc::new(RecordingPoster::default());

    let mut broken = ScriptedSource::new("Reddit");
    broken.fail_listing = true;
    seed(&reddit_store, 70, "Already queued").await?;

    let mut scheduler = Scheduler::new(Duration::from_secs(300));
    scheduler.add_instance(instance(
        ScriptedSource::new("Hacker News")
            .with_candidates(&[1])
            .with_story(1, "Story", &["ok"]),
        &hn_store,
        hn_poster.clone(),
    ));
    scheduler.add_instance(instance(broken, &reddit_store, reddit_poster.clone()));

    let results = scheduler.run_once().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "Hacker News");

    let reddit = results[1].1.as_ref().expect("reddit tick ran");
    assert!(!reddit.ingestion.is_complete());
    // A failed ingestion still releases what was queued before
    assert_eq!(reddit.released.as_ref().map(|r| r.external_id.clone()), Some(ExternalId::from(70)));

    assert_eq!(hn_poster.posts().len(), 1);
    assert_eq!(reddit_poster.posts().len(), 1);
    assert!(!hn_store.contains(&ExternalId::from(70)).await?);

    Ok(())
}

#[tokio::test]
async fn test_scheduler_ticks_at_start_then_every_interval() -> Result<()> {
    init_tracing();
    info!("Testing the scheduler loop timing");

    let store = RecordStore::in_memory().await?;
    for id in 80..85 {
        seed(&store, id, "Queued").await?;
    }
    let poster = Arc::new(RecordingPoster::default());

    let mut scheduler = Scheduler::new(Duration::from_millis(500));
    scheduler.add_instance(instance(ScriptedSource::new("Hacker News"), &store, poster.clone()));
    let scheduler = Arc::new(scheduler);
    let running = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(poster.posts().len(), 1, "first tick fires immediately");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(poster.posts().len(), 2, "second tick fires after one interval");

    running.abort();
    assert!(running.await.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.in_flight().is_empty());

    let stats = store.stats().await?;
    assert_eq!((stats.published, stats.pending), (2, 3));
    assert!(poster.posts()[0].starts_with("Queued\n\n"));

    Ok(())
}
