use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::PublisherConfig;
use crate::model::GeoPoint;
use crate::store::MemoryStore;
use crate::test_utils::{
    FixedLocationSource, FlakyStore, ScriptedLocationSource, StaticPermissionGate,
};

fn config(interval_ms: u64) -> PublisherConfig {
    PublisherConfig {
        interval_ms,
        ..PublisherConfig::default()
    }
}

fn publisher(
    store: Arc<dyn RendezvousStore>,
    source: Arc<dyn LocationSource>,
    permissions: Arc<dyn PermissionGate>,
    interval_ms: u64,
) -> Publisher {
    Publisher::new("bus-7", store, source, permissions, &config(interval_ms))
}

#[tokio::test(start_paused = true)]
async fn test_three_ticks_then_stop() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![
        GeoPoint::new(30.0, 78.0),
        GeoPoint::new(30.001, 78.001),
        GeoPoint::new(30.002, 78.002),
    ]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    assert_eq!(publisher.current_state(), LoopState::Running);

    // Three full intervals; the first sample lands after one interval.
    tokio::time::sleep(Duration::from_millis(15_100)).await;

    let record = store.get_state("bus-7").await.unwrap().unwrap();
    assert!(record.active);
    assert_eq!(record.position.latitude, 30.002);
    assert_eq!(record.position.longitude, 78.002);

    let log = store.get_log("bus-7").await.unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].position.latitude, 30.0);
    assert_eq!(log[1].position.latitude, 30.001);
    assert_eq!(log[2].position.latitude, 30.002);
    for pair in log.windows(2) {
        assert!(pair[0].position.captured_at <= pair[1].position.captured_at);
    }

    publisher.stop().await;
    assert_eq!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::Requested)
    );

    let record = store.get_state("bus-7").await.unwrap().unwrap();
    assert!(!record.active);
    assert_eq!(record.position.latitude, 30.002);
    assert_eq!(store.get_log("bus-7").await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_sample_before_first_interval_elapses() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![GeoPoint::new(
        30.0, 78.0,
    )]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4_900)).await;

    assert!(store.get_state("bus-7").await.unwrap().is_none());
    assert!(store.get_log("bus-7").await.unwrap().is_empty());

    publisher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_creates_no_timer() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![GeoPoint::new(
        30.0, 78.0,
    )]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::denied()),
        5_000,
    );

    let result = publisher.start(PublisherMeta::default()).await;
    assert!(matches!(result, Err(PublishError::PermissionDenied)));
    assert_eq!(publisher.current_state(), LoopState::Idle);

    tokio::time::sleep(Duration::from_millis(11_000)).await;
    assert!(store.get_state("bus-7").await.unwrap().is_none());
    assert!(store.get_log("bus-7").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sample_failure_before_first_write_leaves_no_record() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_results(vec![]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    assert!(matches!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::SampleFailure(_))
    ));
    // Marking inactive without a record is a no-op.
    assert!(store.get_state("bus-7").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_sample_failure_after_success_flips_inactive() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![GeoPoint::new(
        30.0, 78.0,
    )]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10_100)).await;

    assert!(matches!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::SampleFailure(_))
    ));

    let record = store.get_state("bus-7").await.unwrap().unwrap();
    assert!(!record.active);
    assert_eq!(record.position.latitude, 30.0);
    assert_eq!(store.get_log("bus-7").await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_fix_stops_the_loop() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![GeoPoint::new(
        91.0, 78.0,
    )]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    assert!(matches!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::SampleFailure(_))
    ));
    assert!(store.get_state("bus-7").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_write_failures_do_not_stop_the_loop() {
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    flaky.set_fail_state_writes(true).await;

    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![
        GeoPoint::new(30.0, 78.0),
        GeoPoint::new(30.001, 78.001),
    ]));
    let publisher = publisher(
        flaky.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    // State write failed but the tick completed; the log still grew.
    assert_eq!(publisher.current_state(), LoopState::Running);
    assert!(memory.get_state("bus-7").await.unwrap().is_none());
    assert_eq!(memory.get_log("bus-7").await.unwrap().len(), 1);

    // The next tick recovers once the store behaves again.
    flaky.set_fail_state_writes(false).await;
    tokio::time::sleep(Duration::from_millis(5_000)).await;

    let record = memory.get_state("bus-7").await.unwrap().unwrap();
    assert!(record.active);
    assert_eq!(record.position.latitude, 30.001);

    publisher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_log_append_failure_does_not_block_state_write() {
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    flaky.set_fail_log_appends(true).await;

    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![
        GeoPoint::new(30.0, 78.0),
        GeoPoint::new(30.001, 78.001),
    ]));
    let publisher = publisher(
        flaky.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    // Log append failed but the tick completed; the state still landed.
    assert_eq!(publisher.current_state(), LoopState::Running);
    let record = memory.get_state("bus-7").await.unwrap().unwrap();
    assert!(record.active);
    assert_eq!(record.position.latitude, 30.0);
    assert!(memory.get_log("bus-7").await.unwrap().is_empty());

    flaky.set_fail_log_appends(false).await;
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(memory.get_log("bus-7").await.unwrap().len(), 1);

    publisher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_inactive_write_on_stop_is_not_fatal() {
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    let source = Arc::new(FixedLocationSource::new(GeoPoint::new(30.0, 78.0)));
    let publisher = publisher(
        flaky.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    flaky.set_fail_inactive_writes(true).await;
    publisher.stop().await;

    // The stop itself completes; only the inactive merge was lost.
    assert_eq!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::Requested)
    );
    let record = memory.get_state("bus-7").await.unwrap().unwrap();
    assert!(record.active);

    // No further ticks either way.
    tokio::time::sleep(Duration::from_millis(10_000)).await;
    assert_eq!(memory.get_log("bus-7").await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_the_timer() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![
        GeoPoint::new(30.0, 78.0),
        GeoPoint::new(30.001, 78.001),
        GeoPoint::new(30.002, 78.002),
        GeoPoint::new(30.003, 78.003),
    ]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert_eq!(store.get_log("bus-7").await.unwrap().len(), 1);

    // Restart; were both timers alive, two samples would land per
    // interval from here on.
    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    assert_eq!(store.get_log("bus-7").await.unwrap().len(), 2);
    publisher.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![GeoPoint::new(
        30.0, 78.0,
    )]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    publisher.stop().await;
    publisher.stop().await;

    assert_eq!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::Requested)
    );
    let record = store.get_state("bus-7").await.unwrap().unwrap();
    assert!(!record.active);

    // No ticks after stop, however long the clock runs.
    tokio::time::sleep(Duration::from_millis(20_000)).await;
    assert_eq!(store.get_log("bus-7").await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_leaves_the_publisher_idle() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FixedLocationSource::new(GeoPoint::new(30.0, 78.0)));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.stop().await;

    assert_eq!(publisher.current_state(), LoopState::Idle);
    assert!(store.get_state("bus-7").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_sample_failure_keeps_the_reason() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_results(vec![]));
    let publisher = publisher(
        store,
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    publisher.start(PublisherMeta::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    publisher.stop().await;

    assert!(matches!(
        publisher.current_state(),
        LoopState::Stopped(StopReason::SampleFailure(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_meta_is_carried_into_every_state_write() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedLocationSource::with_fixes(vec![GeoPoint::new(
        30.0, 78.0,
    )]));
    let publisher = publisher(
        store.clone(),
        source,
        Arc::new(StaticPermissionGate::granted()),
        5_000,
    );

    let meta = PublisherMeta {
        display_name: Some("A. Driver".to_string()),
        vehicle_label: Some("42".to_string()),
        route_label: Some("Clock Tower - University".to_string()),
    };
    publisher.start(meta.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    let record = store.get_state("bus-7").await.unwrap().unwrap();
    assert_eq!(record.meta, meta);

    publisher.stop().await;
}
