//! Tests for the sliding-window rate limiter.

use super::*;
use crate::adapters::InMemoryWindowStore;
use crate::clock::ManualClock;
use chrono::{TimeZone, Utc};
use std::time::Duration;

fn tenant() -> TenantId {
    TenantId::new("acme-corp").unwrap()
}

fn endpoint() -> EndpointId {
    EndpointId::new("tickets").unwrap()
}

fn limiter() -> (RateLimiter, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 11, 3, 8, 43, 40).unwrap());
    let limiter = RateLimiter::with_clock(
        Arc::new(InMemoryWindowStore::new()),
        Arc::new(clock.clone()),
    );
    (limiter, clock)
}

mod policy_tests {
    use super::*;

    #[test]
    fn test_default_policy_is_100_per_minute() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.limit, 100);
        assert_eq!(policy.window_seconds, 60);
        assert_eq!(policy.window_millis(), 60_000);
    }

    #[test]
    fn test_zero_limit_or_window_is_rejected() {
        assert!(RateLimitPolicy::new(0, 60).is_err());
        assert!(RateLimitPolicy::new(10, 0).is_err());
        assert!(RateLimitPolicy::new(1, 1).is_ok());
    }

    #[test]
    fn test_storage_key_includes_tenant_and_endpoint() {
        let key = WindowKey::new(tenant(), endpoint());
        assert_eq!(key.storage_key(), "webhook-gate:ratelimit:acme-corp:tickets");
    }

    #[test]
    fn test_entry_tokens_are_unique() {
        let a = SlidingWindowEntry::new(1);
        let b = SlidingWindowEntry::new(1);
        assert_ne!(a.token, b.token);
        assert!(a.token.starts_with("1-"));
    }
}

mod retry_after_tests {
    use super::*;

    #[test]
    fn test_rounds_up_to_whole_seconds() {
        assert_eq!(retry_after_seconds(Some(0), 60_000, 1), 60);
        assert_eq!(retry_after_seconds(Some(0), 60_000, 59_001), 1);
        assert_eq!(retry_after_seconds(Some(0), 60_000, 58_999), 2);
    }

    /// Verify the hint never drops to zero or below.
    #[test]
    fn test_is_at_least_one_second() {
        assert_eq!(retry_after_seconds(Some(0), 60_000, 60_000), 1);
        assert_eq!(retry_after_seconds(Some(0), 60_000, 90_000), 1);
        assert_eq!(retry_after_seconds(None, 60_000, 0), 1);
    }
}

mod limiter_tests {
    use super::*;

    /// Verify that requests 1-3 pass and the 4th is refused with a retry hint.
    #[tokio::test]
    async fn test_limit_three_rejects_fourth() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new(3, 60).unwrap();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter
                .check_and_record(&tenant(), &endpoint(), &policy)
                .await
                .unwrap();
            assert_eq!(
                decision,
                RateLimitDecision::Admitted {
                    remaining: expected_remaining
                }
            );
            clock.advance(Duration::from_secs(1));
        }

        let decision = limiter
            .check_and_record(&tenant(), &endpoint(), &policy)
            .await
            .unwrap();
        match decision {
            RateLimitDecision::Rejected {
                retry_after_seconds,
            } => {
                // Oldest entry is 3s old in a 60s window.
                assert_eq!(retry_after_seconds, 57);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admits_again_after_window_passes() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new(3, 60).unwrap();

        for _ in 0..3 {
            limiter
                .check_and_record(&tenant(), &endpoint(), &policy)
                .await
                .unwrap();
        }
        assert!(!limiter
            .check_and_record(&tenant(), &endpoint(), &policy)
            .await
            .unwrap()
            .is_admitted());

        clock.advance(Duration::from_millis(60_001));

        assert!(limiter
            .check_and_record(&tenant(), &endpoint(), &policy)
            .await
            .unwrap()
            .is_admitted());
    }

    /// Verify that rejected requests do not extend the window.
    #[tokio::test]
    async fn test_rejections_are_not_recorded() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new(1, 10).unwrap();

        limiter
            .check_and_record(&tenant(), &endpoint(), &policy)
            .await
            .unwrap();
        for _ in 0..5 {
            clock.advance(Duration::from_secs(1));
            limiter
                .check_and_record(&tenant(), &endpoint(), &policy)
                .await
                .unwrap();
        }

        assert_eq!(
            limiter
                .current_usage(&tenant(), &endpoint(), &policy)
                .await
                .unwrap(),
            1
        );
        clock.advance(Duration::from_millis(5_001));
        assert!(limiter
            .check_and_record(&tenant(), &endpoint(), &policy)
            .await
            .unwrap()
            .is_admitted());
    }

    #[tokio::test]
    async fn test_reset_restores_full_quota() {
        let (limiter, _clock) = limiter();
        let policy = RateLimitPolicy::new(2, 60).unwrap();

        for _ in 0..2 {
            limiter
                .check_and_record(&tenant(), &endpoint(), &policy)
                .await
                .unwrap();
        }
        limiter.reset(&tenant(), &endpoint()).await.unwrap();

        assert_eq!(
            limiter
                .check_and_record(&tenant(), &endpoint(), &policy)
                .await
                .unwrap(),
            RateLimitDecision::Admitted { remaining: 1 }
        );
    }

    /// Verify that a concurrent burst never admits more than the limit.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_burst_admits_exactly_limit() {
        let (limiter, _clock) = limiter();
        let policy = RateLimitPolicy::new(10, 60).unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .check_and_record(&tenant(), &endpoint(), &policy)
                    .await
                    .unwrap()
                    .is_admitted()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_store_failure_is_propagated() {
        let mut store = MockWindowStore::new();
        store.expect_check_and_record().returning(|_, _, _, _| {
            Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            })
        });
        let limiter = RateLimiter::new(Arc::new(store));

        let result = limiter
            .check_and_record(&tenant(), &endpoint(), &RateLimitPolicy::default())
            .await;
        assert!(matches!(
            result,
            Err(RateLimitError::Store(StoreError::Unavailable { .. }))
        ));
    }

    /// Verify that the limiter passes the policy window and limit to the store.
    #[tokio::test]
    async fn test_passes_policy_to_store() {
        let mut store = MockWindowStore::new();
        store
            .expect_check_and_record()
            .withf(|key, entry, window_ms, limit| {
                key.tenant_id.as_str() == "acme-corp"
                    && entry.timestamp_ms == 42_000
                    && *window_ms == 30_000
                    && *limit == 7
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(WindowCheck {
                    admitted: false,
                    count: 7,
                    oldest_ms: Some(20_000),
                })
            });
        let limiter = RateLimiter::new(Arc::new(store));

        let decision = limiter
            .check_and_record_at(
                &tenant(),
                &endpoint(),
                &RateLimitPolicy::new(7, 30).unwrap(),
                42_000,
            )
            .await
            .unwrap();

        assert_eq!(
            decision,
            RateLimitDecision::Rejected {
                retry_after_seconds: 8
            }
        );
    }
}
