use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use ratekeeper::ratelimit::{FixedWindowLimiter, ManualClock, RateLimiter};

#[tokio::test]
async fn test_quota_scenario() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    let limiter =
        FixedWindowLimiter::with_clock(2, Duration::from_secs(1), Arc::new(clock.clone())).unwrap();

    let cases: [(&str, &str, i64, bool); 5] = [
        ("first request allowed", "user1", 0, true),
        ("second request allowed", "user1", 0, true),
        ("third request denied", "user1", 0, false),
        ("window resets after expiry", "user1", 1, true),
        ("different key has separate limit", "user2", 0, true),
    ];

    for (name, key, advance_secs, expected) in cases {
        clock.advance(TimeDelta::seconds(advance_secs));
        let allowed = limiter.allow(key).await.unwrap();
        assert_eq!(allowed, expected, "{}", name);
    }
}

#[tokio::test]
async fn test_each_window_admits_exactly_limit() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    let limiter =
        FixedWindowLimiter::with_clock(3, Duration::from_secs(10), Arc::new(clock.clone())).unwrap();

    // Nine calls spread over each ten-second window, then step past its end.
    for window in 0..10 {
        let mut admitted = 0;
        for _ in 0..9 {
            if limiter.allow("steady").await.unwrap() {
                admitted += 1;
            }
            clock.advance(TimeDelta::milliseconds(1_111));
        }
        assert_eq!(admitted, 3, "window {} admitted {}", window, admitted);
        clock.advance(TimeDelta::seconds(1));
    }
}

#[tokio::test]
async fn test_limiter_behind_trait_object() {
    let limiter: Arc<dyn RateLimiter> =
        Arc::new(FixedWindowLimiter::new(1, Duration::from_secs(60)).unwrap());

    assert!(limiter.allow("k").await.unwrap());
    assert!(!limiter.allow("k").await.unwrap());
}
