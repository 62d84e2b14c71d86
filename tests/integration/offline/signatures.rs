use crate::common::offline_support::{
    client_id, enqueue, pending_client_ids, sample_signature, seed_remote_note, server_id,
    setup_runtime, NOTES,
};
use delivery_notes_lib::application::services::SyncOutcome;
use delivery_notes_lib::domain::entities::offline::PendingSignSource;
use delivery_notes_lib::domain::value_objects::offline::SignatureTarget;
use delivery_notes_lib::infrastructure::remote::StoreOp;

#[tokio::test]
async fn signature_queued_for_client_id_lands_on_created_record() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    ctx.runtime
        .signatures
        .enqueue_signature(SignatureTarget::Client(client_id("c1")), sample_signature())
        .await;

    let outcome = ctx.runtime.sync.trigger_sync().await;
    assert!(matches!(outcome, SyncOutcome::Completed(_)));

    let server_id = ctx
        .runtime
        .queue
        .is_uploaded(&client_id("c1"))
        .await
        .expect("uploaded lookup")
        .expect("server id");
    let doc = ctx
        .remote
        .document(NOTES, server_id.as_str())
        .await
        .expect("remote document");
    assert_eq!(doc.str_field("signatureStatus"), Some("completed"));

    let path = doc.str_field("signaturePath").expect("signature path");
    assert!(path.starts_with(&format!("signatures/{}/", server_id)));
    let blob = ctx.remote.blob(path).await.expect("stored blob");
    assert_eq!(blob.content_type, "image/png");
    assert_eq!(ctx.runtime.signatures.pending_count().await, 0);
}

#[tokio::test]
async fn signature_before_upload_waits_for_connectivity() {
    let ctx = setup_runtime(false).await;
    enqueue(&ctx, "c1").await;
    ctx.runtime
        .signatures
        .enqueue_signature(SignatureTarget::Client(client_id("c1")), sample_signature())
        .await;

    assert_eq!(ctx.runtime.sync.trigger_sync().await, SyncOutcome::Offline);
    assert_eq!(pending_client_ids(&ctx).await, vec!["c1"]);
    assert_eq!(ctx.runtime.signatures.pending_count().await, 1);
    assert!(ctx.remote.blob_paths().await.is_empty());

    ctx.connectivity.set_online(true);
    let outcome = ctx.runtime.sync.trigger_sync().await;

    let report = outcome.report().expect("pass report");
    assert_eq!(report.uploaded, 1);
    assert!(pending_client_ids(&ctx).await.is_empty());
    assert_eq!(ctx.runtime.signatures.pending_count().await, 0);
    assert_eq!(ctx.remote.blob_paths().await.len(), 1);
}

#[tokio::test]
async fn failed_blob_upload_is_retried_against_server_id() {
    let ctx = setup_runtime(true).await;
    enqueue(&ctx, "c1").await;
    ctx.runtime
        .signatures
        .enqueue_signature(SignatureTarget::Client(client_id("c1")), sample_signature())
        .await;
    // 最初のパスでは replay と末尾の server 宛て replay の両方で失敗させる
    ctx.remote.fail_next(StoreOp::UploadBlob, 2).await;

    let first = ctx.runtime.sync.trigger_sync().await;
    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(ctx.runtime.signatures.pending_count().await, 1);

    let second = ctx.runtime.sync.trigger_sync().await;
    let report = second.report().expect("pass report");
    assert_eq!(report.signatures.attached, 1);
    assert_eq!(ctx.runtime.signatures.pending_count().await, 0);
}

#[tokio::test]
async fn signature_for_missing_parent_is_dropped_after_bounded_attempts() {
    let ctx = setup_runtime(true).await;
    let max_attempts = ctx.runtime.config.sync.max_signature_attempts;
    seed_remote_note(&ctx, "s1", None).await;
    ctx.runtime
        .signatures
        .enqueue_signature(SignatureTarget::Server(server_id("s1")), sample_signature())
        .await;
    assert!(ctx.remote.remove_document(NOTES, &server_id("s1")).await);

    for _ in 1..max_attempts {
        ctx.runtime.sync.trigger_sync().await;
        assert_eq!(ctx.runtime.signatures.pending_count().await, 1);
    }

    let last = ctx.runtime.sync.trigger_sync().await;
    assert_eq!(last.report().expect("pass report").signatures.dropped, 1);
    assert_eq!(ctx.runtime.signatures.pending_count().await, 0);
    assert_eq!(ctx.remote.calls(StoreOp::UploadBlob).await, 0);
}

#[tokio::test]
async fn upload_failures_before_parent_removal_do_not_shorten_drop_window() {
    let ctx = setup_runtime(true).await;
    let max_attempts = ctx.runtime.config.sync.max_signature_attempts;
    seed_remote_note(&ctx, "s1", None).await;
    ctx.remote
        .fail_next(StoreOp::UploadBlob, max_attempts - 1)
        .await;
    ctx.runtime
        .signatures
        .enqueue_signature(SignatureTarget::Server(server_id("s1")), sample_signature())
        .await;

    for _ in 1..max_attempts {
        ctx.runtime.sync.trigger_sync().await;
        assert_eq!(ctx.runtime.signatures.pending_count().await, 1);
    }

    assert!(ctx.remote.remove_document(NOTES, &server_id("s1")).await);
    let after_removal = ctx.runtime.sync.trigger_sync().await;
    assert_eq!(
        after_removal.report().expect("pass report").signatures.dropped,
        0
    );
    assert_eq!(ctx.runtime.signatures.pending_count().await, 1);
}

#[tokio::test]
async fn pending_sign_list_falls_back_to_cache_when_unreachable() {
    let ctx = setup_runtime(true).await;
    seed_remote_note(&ctx, "s1", Some("c1")).await;
    seed_remote_note(&ctx, "s2", Some("c2")).await;

    let fresh = ctx.runtime.pending_signatures.pending_sign_documents().await;
    assert_eq!(fresh.source, PendingSignSource::Fresh);
    assert_eq!(fresh.documents.len(), 2);

    ctx.remote.set_available(false);
    let cached = ctx.runtime.pending_signatures.pending_sign_documents().await;

    assert_eq!(cached.source, PendingSignSource::Cached);
    assert_eq!(cached.documents, fresh.documents);
    assert!(cached.fetched_at.is_some());
}
