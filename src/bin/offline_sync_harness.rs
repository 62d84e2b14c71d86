use std::time::Duration;

use delivery_notes_lib::application::ports::DocumentStore;
use delivery_notes_lib::domain::entities::offline::{DeliveryRecordDraft, SyncEvent};
use delivery_notes_lib::domain::value_objects::offline::{
    RecordPayload, SignatureImage, SignatureTarget,
};
use delivery_notes_lib::infrastructure::network::WatchConnectivity;
use delivery_notes_lib::infrastructure::offline::metrics;
use delivery_notes_lib::infrastructure::remote::InMemoryRemoteStore;
use delivery_notes_lib::shared::config::AppConfig;
use delivery_notes_lib::{init_logging, SyncRuntime};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const SAMPLE_SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgo=";

#[derive(Debug, Serialize)]
struct HarnessSummary {
    uploaded_documents: usize,
    stored_blobs: Vec<String>,
    pending_records: u32,
    pending_signatures: u32,
    events: Vec<String>,
    metrics: metrics::SyncMetricsSnapshot,
}

fn build_config() -> AppConfig {
    let mut cfg = AppConfig::from_env();
    if std::env::var("DELIVERY_SYNC_DATABASE_URL").is_err() {
        cfg.database.url = "sqlite::memory:".to_string();
        cfg.database.max_connections = 1;
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = build_config();
    let collection = cfg.remote.notes_collection.clone();

    let remote = InMemoryRemoteStore::new();
    let connectivity = WatchConnectivity::new(false);
    let runtime = SyncRuntime::new(
        cfg,
        Arc::new(remote.clone()),
        Arc::new(remote.clone()),
        connectivity.clone(),
    )
    .await?;
    let watcher = runtime.start_auto_sync();
    let mut events = runtime.events.subscribe();

    info!("Starting offline sync harness");

    // オフライン中に納品書を 2 件作成し、1 件目に署名する
    let acme = RecordPayload::new(json!({"customer": "Acme", "items": [{"sku": "A-1", "qty": 3}]}))
        .map_err(anyhow::Error::msg)?;
    let globex = RecordPayload::new(json!({"customer": "Globex", "items": []}))
        .map_err(anyhow::Error::msg)?;
    let first = runtime
        .queue
        .enqueue_record(DeliveryRecordDraft::new(acme))
        .await;
    runtime
        .queue
        .enqueue_record(DeliveryRecordDraft::new(globex))
        .await;
    runtime
        .signatures
        .enqueue_signature(
            SignatureTarget::Client(first.client_id.clone()),
            SignatureImage::from_data_url(SAMPLE_SIGNATURE).map_err(anyhow::Error::msg)?,
        )
        .await;

    let offline = runtime.sync.trigger_sync().await;
    info!(outcome = ?offline, "Triggered sync while offline");

    connectivity.set_online(true);
    if watcher.is_none() {
        runtime.sync.trigger_sync().await;
    }

    let mut seen = Vec::new();
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(event) = events.recv().await {
            seen.push(event.name().to_string());
            if matches!(event, SyncEvent::SyncDone { .. } | SyncEvent::SyncError { .. }) {
                break;
            }
        }
    })
    .await;
    if waited.is_err() {
        anyhow::bail!("sync did not finish after reconnect");
    }
    // 署名の再送はパス完了後に走るため少し待つ
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = runtime.sync.status().await;
    let uploaded = remote.documents(&collection).await;
    for doc in &uploaded {
        let fetched = remote.get_document(&collection, &doc.id).await?;
        info!(
            server_id = %doc.id,
            signature_status = ?fetched.as_ref().and_then(|d| d.str_field("signatureStatus")),
            "Uploaded delivery note"
        );
    }

    let summary = HarnessSummary {
        uploaded_documents: uploaded.len(),
        stored_blobs: remote.blob_paths().await,
        pending_records: status.pending_records,
        pending_signatures: status.pending_signatures,
        events: seen,
        metrics: metrics::snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(handle) = watcher {
        handle.abort();
    }
    runtime.shutdown().await;
    Ok(())
}
