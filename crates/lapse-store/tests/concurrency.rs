use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lapse_store::{EphemeralStore, FsBackend, InMemoryBackend};
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thousand_concurrent_creates_get_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path()).await.unwrap();
    let store = EphemeralStore::builder(Arc::new(backend)).build();

    let mut tasks = JoinSet::new();
    for i in 0..1000u32 {
        let store = store.clone();
        tasks.spawn(async move {
            let body = i.to_be_bytes();
            let record = store
                .create_bytes(&body, &format!("{i}.bin"), "application/octet-stream", None)
                .await
                .unwrap();
            (i, record)
        });
    }

    let mut ids = HashSet::new();
    let mut records = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (i, record) = joined.unwrap();
        assert!(ids.insert(record.id), "duplicate id {}", record.id);
        records.push((i, record));
    }
    assert_eq!(ids.len(), 1000);

    for (i, record) in records.iter().step_by(37) {
        let (_, content) = store.get(&record.id).await.unwrap();
        assert_eq!(&content[..], &i.to_be_bytes());
    }
    assert_eq!(store.list().await.unwrap().len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deletes_and_sweeps_settle() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = EphemeralStore::builder(backend.clone()).build();

    let mut ids = Vec::new();
    for _ in 0..50 {
        let record = store
            .create_bytes(b"x", "x", "text/plain", Some(Duration::from_secs(600)))
            .await
            .unwrap();
        ids.push(record.id);
    }

    let mut tasks = JoinSet::new();
    for id in ids.iter().copied() {
        for _ in 0..3 {
            let store = store.clone();
            tasks.spawn(async move { store.delete(&id).await.unwrap() });
        }
    }
    for _ in 0..4 {
        let store = store.clone();
        tasks.spawn(async move {
            store.sweep_once().await.unwrap();
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    assert_eq!(backend.blob_count(), 0);
    assert_eq!(backend.metadata_count(), 0);
    for id in &ids {
        assert!(store.get(id).await.unwrap_err().is_not_found());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reads_during_delete_see_whole_object_or_not_found() {
    let backend = Arc::new(InMemoryBackend::new());
    let store = EphemeralStore::builder(backend).build();
    let record = store
        .create_bytes(b"stable content", "s", "text/plain", None)
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let store = store.clone();
        let id = record.id;
        tasks.spawn(async move {
            for _ in 0..20 {
                match store.get(&id).await {
                    Ok((_, content)) => assert_eq!(&content[..], b"stable content"),
                    Err(e) => assert!(e.is_not_found(), "unexpected error {e}"),
                }
                tokio::task::yield_now().await;
            }
        });
    }
    {
        let store = store.clone();
        let id = record.id;
        tasks.spawn(async move { store.delete(&id).await.unwrap() });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }
    assert!(!store.exists(&record.id).await.unwrap());
}
