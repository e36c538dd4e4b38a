//! Contract Test: Classifier Call Spacing
//!
//! Constraints verified:
//! - Consecutive classifier calls start at least `min_call_spacing` apart,
//!   retries included
//! - Sweeps and ad-hoc checks share one spacing budget
//! - No two classifier calls are ever in flight at once
//!
//! These tests run on Tokio's paused clock, so waits are exact and instant.

mod common;

use common::*;
use domwatch_core::UserId;
use domwatch_core::traits::DomainStatus;
use std::time::Duration;
use tokio::task::JoinSet;

const SPACING: Duration = Duration::from_secs(1);

fn spaced_config() -> domwatch_core::MonitorConfig {
    let mut config = minimal_config();
    config.engine.min_call_spacing_ms = 1000;
    config
}

fn assert_spaced(times: &[tokio::time::Instant]) {
    let mut sorted = times.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        assert!(
            pair[1] - pair[0] >= SPACING,
            "calls only {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn sweep_calls_are_spaced() {
    let harness = Harness::new(spaced_config());
    for i in 0..5 {
        harness
            .monitor
            .subscribe(UserId(1), &format!("site{}.com", i))
            .await
            .unwrap();
    }

    harness.monitor.run_sweep_now().await.unwrap();

    let times = harness.classifier.call_times();
    assert_eq!(times.len(), 5);
    assert_spaced(&times);
}

#[tokio::test(start_paused = true)]
async fn retries_respect_spacing() {
    let harness = Harness::new(spaced_config());
    harness.monitor.subscribe(UserId(1), "flaky.com").await.unwrap();
    harness.monitor.subscribe(UserId(1), "steady.com").await.unwrap();
    harness
        .classifier
        .script("flaky.com", [Answer::Fail("reset"), Answer::blocked()]);

    harness.monitor.run_sweep_now().await.unwrap();

    let times = harness.classifier.call_times();
    assert_eq!(times.len(), 3);
    assert_spaced(&times);
}

#[tokio::test(start_paused = true)]
async fn ad_hoc_checks_share_the_budget_with_sweeps() {
    let harness = Harness::new(spaced_config());
    harness
        .classifier
        .set_default(Answer::Slow(Duration::from_millis(300), DomainStatus::NotBlocked));
    for i in 0..4 {
        harness
            .monitor
            .subscribe(UserId(1), &format!("site{}.com", i))
            .await
            .unwrap();
    }

    let mut work = JoinSet::new();
    {
        let monitor = harness.monitor.clone();
        work.spawn(async move {
            monitor.run_sweep_now().await.unwrap();
        });
    }
    for user in 2..5 {
        let monitor = harness.monitor.clone();
        work.spawn(async move {
            monitor.check_now(UserId(user), "adhoc.com").await.unwrap();
        });
    }
    while let Some(joined) = work.join_next().await {
        joined.unwrap();
    }

    let times = harness.classifier.call_times();
    assert_eq!(times.len(), 7);
    assert_spaced(&times);
    assert_eq!(harness.classifier.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_calls_are_never_overlapped() {
    let mut config = spaced_config();
    config.engine.min_call_spacing_ms = 0;
    let harness = Harness::new(config);
    harness
        .classifier
        .set_default(Answer::Slow(Duration::from_secs(2), DomainStatus::Blocked));

    let mut checks = JoinSet::new();
    for user in 0..5 {
        let monitor = harness.monitor.clone();
        checks.spawn(async move { monitor.check_now(UserId(user), "example.com").await });
    }
    while let Some(joined) = checks.join_next().await {
        assert_eq!(joined.unwrap().unwrap().status, DomainStatus::Blocked);
    }

    assert_eq!(harness.classifier.call_count(), 5);
    assert_eq!(harness.classifier.max_in_flight(), 1);
}
