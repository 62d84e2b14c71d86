use crate::common::offline_support::{
    client_id, drain_events, pending_client_ids, sample_draft, server_id, setup_file_runtime,
    NOTES,
};
use delivery_notes_lib::application::services::SyncOutcome;
use delivery_notes_lib::domain::entities::offline::SyncEvent;
use delivery_notes_lib::infrastructure::remote::{InMemoryRemoteStore, StoreOp};
use sqlx::Executor;

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite:{}?mode=rwc", dir.path().join("notes.db").display())
}

#[tokio::test]
async fn marked_but_still_queued_record_is_cleaned_up_after_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    let remote = InMemoryRemoteStore::new();

    // アップロード済みの記録後、キューから外す前に落ちた状態を作る
    {
        let ctx = setup_file_runtime(&url, remote.clone(), false).await;
        ctx.runtime.queue.enqueue_record(sample_draft("c2")).await;
        ctx.runtime
            .queue
            .mark_uploaded(&client_id("c2"), &server_id("s2"))
            .await
            .expect("mark uploaded");
        ctx.runtime.shutdown().await;
    }

    let ctx = setup_file_runtime(&url, remote, true).await;
    assert_eq!(pending_client_ids(&ctx).await, vec!["c2"]);
    let mut rx = ctx.runtime.events.subscribe();

    let outcome = ctx.runtime.sync.trigger_sync().await;

    assert!(matches!(outcome, SyncOutcome::Completed(_)));
    assert!(pending_client_ids(&ctx).await.is_empty());
    assert_eq!(ctx.remote.calls(StoreOp::Create).await, 0);
    assert_eq!(ctx.remote.calls(StoreOp::Query).await, 0);
    assert!(drain_events(&mut rx).contains(&SyncEvent::SyncDone { count: 1 }));
    ctx.runtime.shutdown().await;
}

#[tokio::test]
async fn queued_records_survive_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    let remote = InMemoryRemoteStore::new();

    {
        let ctx = setup_file_runtime(&url, remote.clone(), false).await;
        for id in ["c1", "c2", "c3"] {
            ctx.runtime.queue.enqueue_record(sample_draft(id)).await;
        }
        ctx.runtime.shutdown().await;
    }

    let ctx = setup_file_runtime(&url, remote, true).await;
    assert_eq!(pending_client_ids(&ctx).await, vec!["c1", "c2", "c3"]);

    ctx.runtime.sync.trigger_sync().await;

    assert_eq!(ctx.remote.documents(NOTES).await.len(), 3);
    ctx.runtime.shutdown().await;
}

#[tokio::test]
async fn rows_from_newer_schema_are_left_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);
    let ctx = setup_file_runtime(&url, InMemoryRemoteStore::new(), true).await;
    ctx.runtime.queue.enqueue_record(sample_draft("c1")).await;

    ctx.runtime
        .pool
        .get_pool()
        .execute(
            r#"
            INSERT INTO offline_delivery_notes (client_id, schema_version, record_json, created_at)
            VALUES ('c-future', 99, '{"clientId":"c-future","shape":"unknown"}', 0)
            "#,
        )
        .await
        .expect("insert future row");

    ctx.runtime.sync.trigger_sync().await;

    let (remaining,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM offline_delivery_notes WHERE client_id = 'c-future'")
            .fetch_one(ctx.runtime.pool.get_pool())
            .await
            .expect("future row count");
    assert_eq!(remaining, 1);
    assert_eq!(ctx.remote.documents(NOTES).await.len(), 1);
    ctx.runtime.shutdown().await;
}
