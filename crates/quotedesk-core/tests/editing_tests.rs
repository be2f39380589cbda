//! Lock and version integration tests.
//!
//! These exercise the lock manager and version store together the way a
//! request handler uses them.

use futures::future::join_all;
use quotedesk_core::bus::{Bus, LockAcquired, VersionCreated};
use quotedesk_core::{
    CoreError, LockError, LockManager, QuotationEditor, VersionStore, DEFAULT_LOCK_TTL,
};
use quotedesk_storage::{JsonStorage, MemoryExpiringStore, MemoryStorage, StorageError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn locks(ttl: Duration, bus: &Bus) -> Arc<LockManager> {
    Arc::new(LockManager::connect(
        Arc::new(MemoryExpiringStore::new()),
        ttl,
        bus.clone(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_has_one_winner() {
    let locks = locks(DEFAULT_LOCK_TTL, &Bus::new());
    let users = ["user1", "user2", "user3", "user4", "user5"];

    let handles = users.into_iter().map(|user| {
        let locks = locks.clone();
        tokio::spawn(async move { locks.acquire("test_resource_4", user).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("acquire task panicked"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let holder = winners[0].holder_id().to_string();

    for result in &results {
        if let Err(err) = result {
            match err {
                CoreError::Lock(LockError::ResourceLocked { holder_id, .. }) => {
                    assert_eq!(*holder_id, holder)
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    let info = locks.get_lock_info("test_resource_4").await.unwrap().unwrap();
    assert_eq!(info.holder_id, holder);
}

#[tokio::test]
async fn test_quotation_edit_scenario() {
    let bus = Bus::new();
    let locks = locks(DEFAULT_LOCK_TTL, &bus);
    let versions = VersionStore::new(Arc::new(MemoryStorage::new()), locks.clone(), bus);

    let token = locks.acquire("q-42", "user1").await.unwrap();

    let err = locks.acquire("q-42", "user2").await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Lock(LockError::ResourceLocked { ref holder_id, .. }) if holder_id == "user1"
    ));

    let record = versions
        .create_version("q-42", json!({ "discount": { "old": 0, "new": 10 } }), "user1", &token)
        .await
        .unwrap();
    assert_eq!(record.version_number, 1);

    assert!(locks.release("q-42", "user1").await.unwrap());

    let token = locks.acquire("q-42", "user2").await.unwrap();
    assert_eq!(token.holder_id(), "user2");

    let record = versions
        .create_version("q-42", json!({ "status": { "old": "draft", "new": "sent" } }), "user2", &token)
        .await
        .unwrap();
    assert_eq!(record.version_number, 2);

    let history = versions.get_version_history("q-42").await.unwrap();
    let authors: Vec<&str> = history.iter().map(|r| r.created_by.as_str()).collect();
    assert_eq!(authors, vec!["user2", "user1"]);
}

#[tokio::test(start_paused = true)]
async fn test_expired_lock_blocks_version_and_frees_resource() {
    let bus = Bus::new();
    let locks = locks(Duration::from_secs(300), &bus);
    let versions = VersionStore::new(Arc::new(MemoryStorage::new()), locks.clone(), bus);

    let token = locks.acquire("q-7", "user1").await.unwrap();
    tokio::time::advance(Duration::from_secs(301)).await;

    assert!(locks.get_lock_info("q-7").await.unwrap().is_none());
    let err = versions
        .create_version("q-7", json!({}), "user1", &token)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Lock(LockError::NotHeld { .. })));
    assert!(versions.get_version_history("q-7").await.unwrap().is_empty());

    locks.acquire("q-7", "user2").await.unwrap();
}

#[tokio::test]
async fn test_versions_persist_in_json_storage() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Bus::new();
    let locks = locks(DEFAULT_LOCK_TTL, &bus);

    {
        let versions = VersionStore::new(
            Arc::new(JsonStorage::new(dir.path())),
            locks.clone(),
            bus.clone(),
        );
        let token = locks.acquire("q-1", "user1").await.unwrap();
        for n in 0..3 {
            versions
                .create_version("q-1", json!({ "n": n }), "user1", &token)
                .await
                .unwrap();
        }
    }

    // A fresh store over the same directory sees the same history
    let versions = VersionStore::new(Arc::new(JsonStorage::new(dir.path())), locks, bus);
    let latest = versions.get_latest_version("q-1").await.unwrap().unwrap();
    assert_eq!(latest.version_number, 3);
    assert_eq!(latest.changes, json!({ "n": 2 }));
    assert!(dir
        .path()
        .join("version")
        .join("q-1")
        .join("00000003.json")
        .exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_under_one_token_stay_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Bus::new();
    let locks = locks(DEFAULT_LOCK_TTL, &bus);
    let versions = Arc::new(VersionStore::new(
        Arc::new(JsonStorage::new(dir.path())),
        locks.clone(),
        bus,
    ));
    let token = locks.acquire("q-1", "user1").await.unwrap();

    let handles = (0..16).map(|n| {
        let versions = versions.clone();
        let token = token.clone();
        tokio::spawn(async move {
            versions
                .create_version("q-1", json!({ "n": n }), "user1", &token)
                .await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("append task panicked"))
        .collect();

    let mut created = 0;
    for result in &results {
        match result {
            Ok(_) => created += 1,
            Err(CoreError::Storage(StorageError::AlreadyExists(_))) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(created >= 1);

    let numbers: Vec<u64> = versions
        .get_version_history("q-1")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version_number)
        .collect();
    let expected: Vec<u64> = (1..=created as u64).rev().collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn test_editor_publishes_activity() {
    let bus = Bus::new();
    let mut acquired = bus.subscribe::<LockAcquired>().await;
    let mut created = bus.subscribe::<VersionCreated>().await;

    let locks = locks(DEFAULT_LOCK_TTL, &bus);
    let versions = Arc::new(VersionStore::new(
        Arc::new(MemoryStorage::new()),
        locks,
        bus.clone(),
    ));
    let editor = QuotationEditor::new(versions);

    let session = editor.begin("q-9", "user1").await.unwrap();
    session
        .record_diff(&json!({ "total": 1 }), &json!({ "total": 2 }))
        .await
        .unwrap();
    session.finish().await.unwrap();

    assert_eq!(acquired.recv().await.unwrap().resource_id, "q-9");
    let event = created.recv().await.unwrap();
    assert_eq!(event.quotation_id, "q-9");
    assert_eq!(event.version_number, 1);
}
