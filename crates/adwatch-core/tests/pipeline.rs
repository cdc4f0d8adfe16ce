//! End-to-end pipeline scenarios: scheduler, result stream and dispatch
//! proxy wired together, with scaled-down timing.

use std::time::Duration;

use adwatch_core::testutil::{RecordingHandler, RecordingSink, ScriptedExtractor};
use adwatch_core::{DispatchProxy, RingScheduler, SchedulerConfig};

/// Two targets, TTL = 3 × interval. The timeline (in intervals):
/// t≈0 the first target is fetched and cached, t≈1 the second, t≈2 the
/// cursor is back at the head but its cool-down has not elapsed, so no
/// fetch happens. Exactly two updates are observed through t≈2.5.
#[tokio::test]
async fn one_pass_then_pause() {
    let interval = Duration::from_millis(50);
    let config = SchedulerConfig {
        tick_interval: interval,
        fetch_deadline: Duration::from_secs(1),
        cache_ttl: interval * 3,
        queue_capacity: 2,
        max_in_flight: None,
    };

    let extractor = ScriptedExtractor::ok();
    let scheduler = RingScheduler::new(extractor.clone(), &config).unwrap();
    scheduler.add_target("https://ads.example/a");
    scheduler.add_target("https://ads.example/b");

    let handler = RecordingHandler::new();
    let sink = RecordingSink::new();
    let proxy = DispatchProxy::new(
        scheduler.take_output().unwrap(),
        handler.clone(),
        sink.clone(),
    );
    let proxy_task = tokio::spawn(proxy.run());

    scheduler.run(interval);
    tokio::time::sleep(interval * 5 / 2).await;
    scheduler.close().await;
    proxy_task.await.unwrap();

    assert_eq!(
        extractor.calls(),
        vec!["https://ads.example/a", "https://ads.example/b"]
    );
    assert_eq!(
        handler.handled_urls(),
        vec!["https://ads.example/a", "https://ads.example/b"]
    );
    assert_eq!(sink.report_count(), 0);
}

/// A target that keeps failing never halts the pipeline: its failures go to
/// the error sink while the other target's updates keep flowing.
#[tokio::test]
async fn failures_and_successes_interleave() {
    use adwatch_core::{FailureKind, FetchOutcome};

    let interval = Duration::from_millis(40);
    let config = SchedulerConfig {
        tick_interval: interval,
        fetch_deadline: Duration::from_secs(1),
        cache_ttl: Duration::from_secs(60),
        queue_capacity: 2,
        max_in_flight: None,
    };

    // First fetch (target a) fails, second (target b) succeeds by default.
    let extractor = ScriptedExtractor::with_responses(vec![FetchOutcome::Failure {
        url: "https://ads.example/a".into(),
        kind: FailureKind::Generic("connection reset".into()),
    }]);
    let scheduler = RingScheduler::new(extractor.clone(), &config).unwrap();
    scheduler.add_target("https://ads.example/a");
    scheduler.add_target("https://ads.example/b");

    let handler = RecordingHandler::new();
    let sink = RecordingSink::new();
    let proxy = DispatchProxy::new(
        scheduler.take_output().unwrap(),
        handler.clone(),
        sink.clone(),
    );
    let proxy_task = tokio::spawn(proxy.run());

    scheduler.run(interval);
    tokio::time::sleep(interval * 4).await;
    scheduler.close().await;
    proxy_task.await.unwrap();

    assert_eq!(handler.handled_urls(), vec!["https://ads.example/b"]);
    assert_eq!(sink.report_count(), 1);
}
