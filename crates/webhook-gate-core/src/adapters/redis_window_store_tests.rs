//! Tests for the Redis window store
//!
//! These need a live server and are ignored by default. Run them with
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test --features redis -- --ignored`.

use super::*;
use crate::{EndpointId, TenantId};

async fn store() -> RedisWindowStore {
    let url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisWindowStore::connect(&url).await.unwrap()
}

/// A key no other test run touches
fn unique_key(endpoint: &str) -> WindowKey {
    WindowKey::new(
        TenantId::new(format!("test-{}", uuid::Uuid::new_v4())).unwrap(),
        EndpointId::new(endpoint).unwrap(),
    )
}

#[tokio::test]
#[ignore = "requires a Redis server at REDIS_URL"]
async fn test_records_until_limit_then_refuses() {
    let store = store().await;
    let key = unique_key("tickets");

    for i in 0..3 {
        let check = store
            .check_and_record(&key, SlidingWindowEntry::new(1_000 + i), 60_000, 3)
            .await
            .unwrap();
        assert!(check.admitted);
        assert_eq!(check.count, (i + 1) as u64);
        assert_eq!(check.oldest_ms, Some(1_000));
    }

    let check = store
        .check_and_record(&key, SlidingWindowEntry::new(1_010), 60_000, 3)
        .await
        .unwrap();
    assert!(!check.admitted);
    assert_eq!(check.count, 3);
    assert_eq!(check.oldest_ms, Some(1_000));

    store.reset(&key).await.unwrap();
}

/// Verify that entries sharing a timestamp are counted separately.
#[tokio::test]
#[ignore = "requires a Redis server at REDIS_URL"]
async fn test_same_millisecond_entries_do_not_collapse() {
    let store = store().await;
    let key = unique_key("tickets");

    for _ in 0..5 {
        store
            .check_and_record(&key, SlidingWindowEntry::new(5_000), 60_000, 10)
            .await
            .unwrap();
    }

    assert_eq!(store.window_size(&key, 5_000, 60_000).await.unwrap(), 5);

    store.reset(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a Redis server at REDIS_URL"]
async fn test_purges_expired_entries() {
    let store = store().await;
    let key = unique_key("tickets");

    store
        .check_and_record(&key, SlidingWindowEntry::new(0), 60_000, 10)
        .await
        .unwrap();
    store
        .check_and_record(&key, SlidingWindowEntry::new(500), 60_000, 10)
        .await
        .unwrap();

    // Cutoff 60_000 - 60_000 = 0: entry at 0 is still inside.
    assert_eq!(store.window_size(&key, 60_000, 60_000).await.unwrap(), 2);
    // Cutoff 1 drops the entry at 0.
    assert_eq!(store.window_size(&key, 60_001, 60_000).await.unwrap(), 1);

    // A purge inside the check frees room for a new entry.
    let check = store
        .check_and_record(&key, SlidingWindowEntry::new(60_600), 60_000, 1)
        .await
        .unwrap();
    assert!(check.admitted);
    assert_eq!(check.count, 1);
    assert_eq!(check.oldest_ms, Some(60_600));

    store.reset(&key).await.unwrap();
}

/// Verify that a refused check on an empty window reports no oldest entry.
#[tokio::test]
#[ignore = "requires a Redis server at REDIS_URL"]
async fn test_zero_limit_reports_no_oldest_entry() {
    let store = store().await;
    let key = unique_key("tickets");

    let check = store
        .check_and_record(&key, SlidingWindowEntry::new(1_000), 60_000, 0)
        .await
        .unwrap();

    assert!(!check.admitted);
    assert_eq!(check.count, 0);
    assert_eq!(check.oldest_ms, None);
}

#[tokio::test]
#[ignore = "requires a Redis server at REDIS_URL"]
async fn test_reset_clears_only_the_given_window() {
    let store = store().await;
    let a = unique_key("tickets");
    let b = unique_key("orders");

    for k in [&a, &b] {
        store
            .check_and_record(k, SlidingWindowEntry::new(0), 60_000, 1)
            .await
            .unwrap();
    }

    store.reset(&a).await.unwrap();

    assert_eq!(store.window_size(&a, 0, 60_000).await.unwrap(), 0);
    assert_eq!(store.window_size(&b, 0, 60_000).await.unwrap(), 1);
    assert!(store
        .check_and_record(&a, SlidingWindowEntry::new(1), 60_000, 1)
        .await
        .unwrap()
        .admitted);

    for k in [&a, &b] {
        store.reset(k).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires a Redis server at REDIS_URL"]
async fn test_reset_of_unknown_key_is_a_no_op() {
    let store = store().await;
    assert!(store.reset(&unique_key("tickets")).await.is_ok());
}
