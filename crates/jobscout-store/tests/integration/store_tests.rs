use std::time::Duration;

use jobscout_core::traits::KvStore;

use crate::common::setup_test_redis;

#[tokio::test]
async fn set_get_ping() {
    let (store, _container) = setup_test_redis().await;

    assert_eq!(store.get("job_exists:10000001").await.unwrap(), None);
    store.set("job_exists:10000001", "true", 300).await.unwrap();
    assert_eq!(
        store.get("job_exists:10000001").await.unwrap().as_deref(),
        Some("true")
    );

    store.set("job_exists:10000001", "false", 300).await.unwrap();
    assert_eq!(
        store.get("job_exists:10000001").await.unwrap().as_deref(),
        Some("false")
    );
    store.ping().await.unwrap();
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let (store, _container) = setup_test_redis().await;
    store.set("company_exists:Acme", "false", 1).await.unwrap();
    store.set("company:name:Acme", "{}", 0).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(store.get("company_exists:Acme").await.unwrap(), None);
    assert!(store.get("company:name:Acme").await.unwrap().is_some());
}

#[tokio::test]
async fn set_many_spans_chunks() {
    let (store, _container) = setup_test_redis().await;
    let keys: Vec<String> = (0..2500u64)
        .map(|i| format!("job_exists:{}", 30_000_000 + i))
        .collect();

    store.set_many(&keys, "true", 300).await.unwrap();
    assert_eq!(store.get(&keys[0]).await.unwrap().as_deref(), Some("true"));
    assert_eq!(store.get(&keys[2499]).await.unwrap().as_deref(), Some("true"));
}

#[tokio::test]
async fn delete_prefix_only_touches_matching_keys() {
    let (store, _container) = setup_test_redis().await;
    let keys: Vec<String> = (0..1200u64)
        .map(|i| format!("job_exists:{}", 40_000_000 + i))
        .collect();
    store.set_many(&keys, "true", 300).await.unwrap();
    store.set("company_exists:Acme", "true", 300).await.unwrap();
    store.push_unique("job_processing_queue", "40000000").await.unwrap();

    let deleted = store.delete_prefix("job_exists:").await.unwrap();
    assert_eq!(deleted, 1200);
    assert_eq!(store.get(&keys[7]).await.unwrap(), None);
    assert!(store.get("company_exists:Acme").await.unwrap().is_some());
    assert_eq!(store.length("job_processing_queue").await.unwrap(), 1);
}
