use std::time::Duration;

use crate::common::offline_support::{
    drain_events, enqueue, pending_client_ids, setup_runtime, wait_for_event, NOTES,
};
use delivery_notes_lib::application::services::SyncOutcome;
use delivery_notes_lib::domain::entities::offline::SyncEvent;
use delivery_notes_lib::infrastructure::offline::metrics;
use delivery_notes_lib::infrastructure::remote::StoreOp;
use delivery_notes_lib::shared::config::AppConfig;

#[tokio::test]
async fn trigger_during_pass_is_skipped_not_queued() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    ctx.remote.set_latency(Duration::from_millis(50));

    let sync = &ctx.runtime.sync;
    let (first, second) = tokio::join!(sync.trigger_sync(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let status = sync.status().await;
        (status.is_syncing, sync.trigger_sync().await)
    });

    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(second, (true, SyncOutcome::SkippedInFlight));
    assert_eq!(ctx.remote.calls(StoreOp::Create).await, 1);
}

#[tokio::test]
async fn pass_emits_lifecycle_events_in_order() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    enqueue(&ctx, "c2").await;
    let mut rx = ctx.runtime.events.subscribe();

    ctx.runtime.sync.trigger_sync().await;

    let events = drain_events(&mut rx);
    assert_eq!(events.first(), Some(&SyncEvent::SyncStart { count: 2 }));
    assert_eq!(events.last(), Some(&SyncEvent::SyncDone { count: 2 }));
    let counts: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::QueueCountChanged { count } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 0]);
}

#[tokio::test]
async fn going_offline_does_not_trigger_but_each_reconnect_does() {
    let ctx = setup_runtime(true).await;
    let watcher = ctx.runtime.start_auto_sync().expect("auto sync enabled");
    let mut rx = ctx.runtime.events.subscribe();

    ctx.connectivity.set_online(false);
    enqueue(&ctx, "c1").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain_events(&mut rx)
        .iter()
        .all(|event| !matches!(event, SyncEvent::SyncStart { .. })));
    assert_eq!(pending_client_ids(&ctx).await, vec!["c1"]);

    ctx.connectivity.set_online(true);
    wait_for_event(&mut rx, |event| matches!(event, SyncEvent::SyncDone { count: 1 })).await;

    ctx.connectivity.set_online(false);
    enqueue(&ctx, "c2").await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    ctx.connectivity.set_online(true);
    wait_for_event(&mut rx, |event| matches!(event, SyncEvent::SyncDone { count: 1 })).await;

    assert!(pending_client_ids(&ctx).await.is_empty());
    assert_eq!(ctx.remote.documents(NOTES).await.len(), 2);
    watcher.abort();
}

#[tokio::test]
async fn status_and_metrics_reflect_failed_pass() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    ctx.remote.fail_next(StoreOp::Create, 1).await;
    let before = metrics::snapshot();

    let outcome = ctx.runtime.sync.trigger_sync().await;

    assert!(matches!(outcome, SyncOutcome::Aborted(_)));
    let status = ctx.runtime.sync.status().await;
    assert!(!status.is_syncing);
    assert_eq!(status.pending_records, 1);
    assert_eq!(status.sync_errors, 1);
    assert!(status.last_sync.is_some());

    // メトリクスはプロセス全体で共有されるため増分のみ確認する
    let after = metrics::snapshot();
    assert!(after.total_failure > before.total_failure);
}

#[tokio::test]
async fn auto_sync_can_be_disabled_from_env() {
    std::env::set_var("DELIVERY_SYNC_AUTO_SYNC", "off");
    let config = AppConfig::from_env();
    std::env::remove_var("DELIVERY_SYNC_AUTO_SYNC");

    assert!(!config.sync.auto_sync_on_reconnect);
    assert!(config.validate().is_ok());
}

#[tokio::test]
async fn unreadable_queue_still_reports_sync_error() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    let mut rx = ctx.runtime.events.subscribe();
    ctx.runtime.pool.close().await;

    let outcome = ctx.runtime.sync.trigger_sync().await;

    let report = match outcome {
        SyncOutcome::Aborted(report) => report,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert!(report.error.is_some());
    assert!(report.failed_client_id.is_none());

    let event = wait_for_event(&mut rx, |event| matches!(event, SyncEvent::SyncError { .. })).await;
    assert!(matches!(
        event,
        SyncEvent::SyncError {
            client_id: None,
            ..
        }
    ));
    assert!(!ctx.runtime.sync.status().await.is_syncing);
}
