use anyhow::Result;
use interfaces::{ExternalId, NewRecord, RecordStore};

fn new_record(id: &str) -> NewRecord {
    NewRecord {
        external_id: ExternalId::from(id),
        title: format!("Story {}", id),
        url: format!("https://example.com/{}", id),
        summary: format!("Summary for {} 🙂", id),
    }
}

#[tokio::test]
async fn test_insert_is_idempotent() -> Result<()> {
    let store = RecordStore::in_memory().await?;

    assert!(store.insert_if_absent(&new_record("102")).await?);
    assert!(!store.insert_if_absent(&new_record("102")).await?);

    let stats = store.stats().await?;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.pending, 1);
    assert!(store.contains(&ExternalId::from("102")).await?);
    assert!(!store.contains(&ExternalId::from("101")).await?);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_insert_keeps_original_row() -> Result<()> {
    let store = RecordStore::in_memory().await?;
    store.insert_if_absent(&new_record("7")).await?;

    let mut changed = new_record("7");
    changed.summary = "rewritten".to_string();
    assert!(!store.insert_if_absent(&changed).await?);

    let stored = store.get(&ExternalId::from("7")).await?.expect("record should exist");
    assert_eq!(stored.summary, "Summary for 7 🙂");
    assert!(!stored.published);
    Ok(())
}

#[tokio::test]
async fn test_release_is_fifo_by_insertion() -> Result<()> {
    let store = RecordStore::in_memory().await?;
    // External ids deliberately out of numeric order.
    for id in ["30", "10", "20"] {
        store.insert_if_absent(&new_record(id)).await?;
    }

    let released: Vec<String> = {
        let mut out = Vec::new();
        while let Some(record) = store.take_next_unpublished().await? {
            assert!(record.published);
            out.push(record.external_id.0);
        }
        out
    };

    assert_eq!(released, vec!["30", "10", "20"]);
    assert!(store.take_next_unpublished().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_release_marks_exactly_one() -> Result<()> {
    let store = RecordStore::in_memory().await?;
    for id in ["a", "b", "c"] {
        store.insert_if_absent(&new_record(id)).await?;
    }

    let first = store.take_next_unpublished().await?.expect("a pending record");
    assert_eq!(first.external_id, ExternalId::from("a"));

    let stats = store.stats().await?;
    assert_eq!(stats.published, 1);
    assert_eq!(stats.pending, 2);

    let pending: Vec<_> = store.list_pending().await?.into_iter().map(|r| r.external_id.0).collect();
    assert_eq!(pending, vec!["b", "c"]);

    let persisted = store.get(&ExternalId::from("a")).await?.expect("record a");
    assert!(persisted.published);
    Ok(())
}

#[tokio::test]
async fn test_empty_store_releases_nothing() -> Result<()> {
    let store = RecordStore::in_memory().await?;
    assert!(store.take_next_unpublished().await?.is_none());
    assert_eq!(store.stats().await?.total, 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_releases_never_share_a_record() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("record-store-test-{}", std::process::id()));
    let path = dir.join("release.db");
    let _ = tokio::fs::remove_file(&path).await;

    let store = RecordStore::open(&path).await?;
    for id in 0..6 {
        store.insert_if_absent(&new_record(&id.to_string())).await?;
    }

    let other = RecordStore::open(&path).await?;
    let attempts = (0..4).map(|i| {
        let store = if i % 2 == 0 { store.clone() } else { other.clone() };
        async move { store.take_next_unpublished().await }
    });
    let results = futures::future::join_all(attempts).await;

    let mut released = Vec::new();
    for result in results {
        if let Some(record) = result? {
            released.push(record.external_id.0);
        }
    }
    released.sort();
    released.dedup();
    assert_eq!(released.len(), 4, "each release should claim a distinct record");
    assert_eq!(store.stats().await?.pending, 2);

    store.close().await;
    other.close().await;
    let _ = tokio::fs::remove_dir_all(&dir).await;
    Ok(())
}
