use jobscout_core::cache::QUEUE_KEY;
use jobscout_core::traits::KvStore;

use crate::common::setup_test_redis;

#[tokio::test]
async fn concurrent_enqueue_keeps_one_instance() {
    let (store, _container) = setup_test_redis().await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.push_unique(QUEUE_KEY, "4012345678").await.unwrap()
        }));
    }
    let mut added = 0;
    for h in handles {
        if h.await.unwrap() {
            added += 1;
        }
    }

    assert_eq!(added, 1);
    assert_eq!(store.length(QUEUE_KEY).await.unwrap(), 1);
}

#[tokio::test]
async fn pop_is_fifo_and_releases_membership() {
    let (store, _container) = setup_test_redis().await;

    for id in ["10000001", "10000002", "10000003"] {
        assert!(store.push_unique(QUEUE_KEY, id).await.unwrap());
    }
    assert!(!store.push_unique(QUEUE_KEY, "10000002").await.unwrap());

    assert_eq!(store.pop(QUEUE_KEY).await.unwrap().as_deref(), Some("10000001"));
    assert_eq!(store.pop(QUEUE_KEY).await.unwrap().as_deref(), Some("10000002"));

    // Popped ids may be queued again.
    assert!(store.push_unique(QUEUE_KEY, "10000001").await.unwrap());
    assert_eq!(store.pop(QUEUE_KEY).await.unwrap().as_deref(), Some("10000003"));
    assert_eq!(store.pop(QUEUE_KEY).await.unwrap().as_deref(), Some("10000001"));
    assert_eq!(store.pop(QUEUE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_consumers_never_share_an_item() {
    let (store, _container) = setup_test_redis().await;
    for i in 0..50u64 {
        store
            .push_unique(QUEUE_KEY, &(20_000_000 + i).to_string())
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(v) = store.pop(QUEUE_KEY).await.unwrap() {
                got.push(v);
            }
            got
        }));
    }
    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.unwrap());
    }
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 50);
}

#[tokio::test]
async fn clear_list_drops_items_and_membership() {
    let (store, _container) = setup_test_redis().await;
    store.push_unique(QUEUE_KEY, "10000001").await.unwrap();
    store.push_unique(QUEUE_KEY, "10000002").await.unwrap();

    store.clear_list(QUEUE_KEY).await.unwrap();
    assert_eq!(store.length(QUEUE_KEY).await.unwrap(), 0);
    assert!(store.push_unique(QUEUE_KEY, "10000001").await.unwrap());
}
