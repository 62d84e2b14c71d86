use std::collections::HashSet;
use std::time::Duration;

use crate::common::offline_support::{
    client_id, drain_events, enqueue, pending_client_ids, seed_remote_note, setup_runtime, NOTES,
};
use delivery_notes_lib::application::services::SyncOutcome;
use delivery_notes_lib::domain::entities::offline::SyncEvent;
use delivery_notes_lib::infrastructure::remote::StoreOp;
use futures::future::join_all;

#[tokio::test]
async fn repeated_and_overlapping_triggers_create_each_record_once() {
    let ctx = setup_runtime(true).await;
    for id in ["c1", "c2", "c3"] {
        enqueue(&ctx, id).await;
    }
    ctx.remote.set_latency(Duration::from_millis(20));

    let sync = &ctx.runtime.sync;
    let outcomes = join_all((0..5).map(|_| sync.trigger_sync())).await;
    let completed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SyncOutcome::Completed(_)))
        .count();
    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome, SyncOutcome::Completed(_) | SyncOutcome::SkippedInFlight)));
    assert_eq!(completed, 1);

    ctx.remote.set_latency(Duration::ZERO);
    sync.trigger_sync().await;
    sync.trigger_sync().await;

    let documents = ctx.remote.documents(NOTES).await;
    assert_eq!(documents.len(), 3);
    let client_ids: HashSet<_> = documents
        .iter()
        .filter_map(|doc| doc.str_field("clientId"))
        .collect();
    assert_eq!(client_ids, HashSet::from(["c1", "c2", "c3"]));
    assert_eq!(ctx.remote.calls(StoreOp::Create).await, 3);
    assert!(pending_client_ids(&ctx).await.is_empty());
}

#[tokio::test]
async fn create_failure_halts_pass_without_losing_records() {
    let ctx = setup_runtime(true).await;
    for id in ["c1", "c2", "c3"] {
        enqueue(&ctx, id).await;
    }
    // c1 は既にリモートにあるので作成を経由せずに片付く
    seed_remote_note(&ctx, "s1", Some("c1")).await;
    ctx.remote.fail_next(StoreOp::Create, 1).await;
    let mut rx = ctx.runtime.events.subscribe();

    let outcome = ctx.runtime.sync.trigger_sync().await;

    assert!(matches!(outcome, SyncOutcome::Aborted(_)));
    assert_eq!(pending_client_ids(&ctx).await, vec!["c2", "c3"]);
    // c3 には手を付けていない
    assert_eq!(ctx.remote.calls(StoreOp::Create).await, 1);
    let errors: Vec<_> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            SyncEvent::SyncError { client_id, .. } => Some(client_id),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec![Some(client_id("c2"))]);

    let retry = ctx.runtime.sync.trigger_sync().await;
    assert!(matches!(retry, SyncOutcome::Completed(_)));
    assert!(pending_client_ids(&ctx).await.is_empty());
    assert_eq!(ctx.remote.documents(NOTES).await.len(), 3);
}

#[tokio::test]
async fn remove_by_client_id_twice_is_a_noop() {
    let ctx = setup_runtime(true).await;
    let record = enqueue(&ctx, "c1").await;

    let first = ctx
        .runtime
        .queue
        .remove_by_client_id(&record.client_id)
        .await
        .expect("first remove");
    let second = ctx
        .runtime
        .queue
        .remove_by_client_id(&record.client_id)
        .await
        .expect("second remove");

    assert!(first);
    assert!(!second);
    assert!(pending_client_ids(&ctx).await.is_empty());
}

#[tokio::test]
async fn lost_create_acknowledgement_does_not_duplicate() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    ctx.remote.lose_next_create_acks(1).await;

    let first = ctx.runtime.sync.trigger_sync().await;
    assert!(matches!(first, SyncOutcome::Aborted(_)));
    assert_eq!(pending_client_ids(&ctx).await, vec!["c1"]);

    let second = ctx.runtime.sync.trigger_sync().await;
    assert!(matches!(second, SyncOutcome::Completed(_)));
    assert_eq!(ctx.remote.documents(NOTES).await.len(), 1);
    assert_eq!(ctx.remote.calls(StoreOp::Create).await, 1);
}

#[tokio::test]
async fn offline_creation_syncs_after_reconnect() {
    let ctx = setup_runtime(false).await;
    let watcher = ctx.runtime.start_auto_sync().expect("auto sync enabled");
    let mut rx = ctx.runtime.events.subscribe();

    enqueue(&ctx, "c1").await;
    enqueue(&ctx, "c2").await;
    assert_eq!(ctx.runtime.sync.trigger_sync().await, SyncOutcome::Offline);
    assert_eq!(ctx.remote.calls(StoreOp::Create).await, 0);

    ctx.connectivity.set_online(true);
    crate::common::offline_support::wait_for_event(&mut rx, |event| {
        matches!(event, SyncEvent::SyncDone { .. })
    })
    .await;

    assert!(pending_client_ids(&ctx).await.is_empty());
    assert_eq!(ctx.remote.documents(NOTES).await.len(), 2);
    for id in ["c1", "c2"] {
        assert!(ctx
            .runtime
            .queue
            .is_uploaded(&client_id(id))
            .await
            .expect("uploaded lookup")
            .is_some());
    }
    watcher.abort();
}
