//! Contract Test: Per-User Subscription Capacity
//!
//! Constraints verified:
//! - A user holds at most `max_subscriptions_per_user` subscriptions
//! - A rejected add leaves the store unchanged
//! - Duplicates are reported as such, even at capacity
//! - Removal is idempotent and frees capacity
//! - The cap holds under concurrent adds

mod common;

use common::*;
use domwatch_core::UserId;
use domwatch_core::error::Error;
use std::collections::HashSet;
use tokio::task::JoinSet;

fn domain(i: usize) -> String {
    format!("site{}.com", i)
}

#[tokio::test]
async fn eleventh_subscription_is_rejected_without_mutation() {
    let harness = Harness::new(minimal_config());
    let user = UserId(100);

    for i in 0..10 {
        harness.monitor.subscribe(user, &domain(i)).await.unwrap();
    }

    let err = harness.monitor.subscribe(user, "extra.com").await.unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { user_id, limit: 10 } if user_id == user));
    assert!(err.is_user_facing());

    let subs = harness.monitor.subscriptions(user).await.unwrap();
    assert_eq!(subs.len(), 10);
    assert!(subs.iter().all(|s| s.domain != "extra.com"));
}

#[tokio::test]
async fn duplicate_at_capacity_reports_already_exists() {
    let harness = Harness::new(minimal_config());
    let user = UserId(100);

    for i in 0..10 {
        harness.monitor.subscribe(user, &domain(i)).await.unwrap();
    }

    let err = harness.monitor.subscribe(user, &domain(3)).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
}

#[tokio::test]
async fn removal_is_idempotent_and_frees_capacity() {
    let harness = Harness::new(minimal_config());
    let user = UserId(100);

    for i in 0..10 {
        harness.monitor.subscribe(user, &domain(i)).await.unwrap();
    }

    assert!(harness.monitor.unsubscribe(user, &domain(0)).await.unwrap());
    assert!(!harness.monitor.unsubscribe(user, &domain(0)).await.unwrap());
    assert!(!harness.monitor.unsubscribe(user, "never-added.com").await.unwrap());

    harness.monitor.subscribe(user, "extra.com").await.unwrap();
    assert_eq!(harness.monitor.subscriptions(user).await.unwrap().len(), 10);
}

#[tokio::test]
async fn capacity_is_per_user() {
    let harness = Harness::new(minimal_config());

    for i in 0..10 {
        harness.monitor.subscribe(UserId(1), &domain(i)).await.unwrap();
    }

    harness.monitor.subscribe(UserId(2), &domain(0)).await.unwrap();
    assert_eq!(harness.monitor.subscriptions(UserId(2)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn configured_limit_is_enforced_by_the_store() {
    let mut config = minimal_config();
    config.limits.max_subscriptions_per_user = 2;
    let store = std::sync::Arc::new(domwatch_core::MemoryStore::with_limits(config.limits));
    let harness = Harness::with_store(config, store);

    harness.monitor.subscribe(UserId(1), "a.com").await.unwrap();
    harness.monitor.subscribe(UserId(1), "b.com").await.unwrap();
    let err = harness.monitor.subscribe(UserId(1), "c.com").await.unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { limit: 2, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_never_exceed_capacity() {
    let harness = Harness::new(minimal_config());
    let user = UserId(7);

    let mut adds = JoinSet::new();
    for i in 0..25 {
        let monitor = harness.monitor.clone();
        adds.spawn(async move { monitor.subscribe(user, &domain(i)).await });
    }

    let mut accepted = 0;
    let mut rejected = 0;
    while let Some(result) = adds.join_next().await {
        match result.unwrap() {
            Ok(_) => accepted += 1,
            Err(Error::CapacityExceeded { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(rejected, 15);

    let subs = harness.monitor.subscriptions(user).await.unwrap();
    let distinct: HashSet<_> = subs.iter().map(|s| s.domain.clone()).collect();
    assert_eq!(subs.len(), 10);
    assert_eq!(distinct.len(), 10);
}

#[tokio::test]
async fn invalid_domains_are_rejected() {
    let harness = Harness::new(minimal_config());

    for input in ["", "localhost", "-bad-.com", "exa mple.com"] {
        let err = harness.monitor.subscribe(UserId(1), input).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "input {:?}", input);
    }
    assert!(harness.monitor.subscriptions(UserId(1)).await.unwrap().is_empty());
}
