use std::sync::Arc;
use std::time::Duration;

use delivery_notes_lib::domain::entities::offline::{DeliveryRecord, DeliveryRecordDraft, SyncEvent};
use delivery_notes_lib::domain::value_objects::offline::{
    ClientId, RecordPayload, ServerId, SignatureImage,
};
use delivery_notes_lib::infrastructure::database::ConnectionPool;
use delivery_notes_lib::infrastructure::network::WatchConnectivity;
use delivery_notes_lib::infrastructure::remote::InMemoryRemoteStore;
use delivery_notes_lib::shared::config::AppConfig;
use delivery_notes_lib::SyncRuntime;
use serde_json::json;
use tokio::sync::broadcast;

pub const NOTES: &str = "deliveryNotes";
pub const SAMPLE_SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgo=";

pub struct OfflineTestContext {
    pub runtime: SyncRuntime,
    pub remote: InMemoryRemoteStore,
    pub connectivity: WatchConnectivity,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".into();
    config.database.max_connections = 1;
    config
}

pub async fn setup_runtime(online: bool) -> OfflineTestContext {
    let pool = ConnectionPool::from_memory().await.expect("in-memory sqlite");
    pool.migrate().await.expect("migrations");
    build_context(test_config(), pool, InMemoryRemoteStore::new(), online)
}

/// ファイル DB を使う。再起動をまたぐ検証用。
pub async fn setup_file_runtime(
    url: &str,
    remote: InMemoryRemoteStore,
    online: bool,
) -> OfflineTestContext {
    let mut config = test_config();
    config.database.url = url.to_string();
    let connectivity = WatchConnectivity::new(online);
    let runtime = SyncRuntime::new(
        config,
        Arc::new(remote.clone()),
        Arc::new(remote.clone()),
        connectivity.clone(),
    )
    .await
    .expect("runtime");

    OfflineTestContext {
        runtime,
        remote,
        connectivity,
    }
}

fn build_context(
    config: AppConfig,
    pool: ConnectionPool,
    remote: InMemoryRemoteStore,
    online: bool,
) -> OfflineTestContext {
    let connectivity = WatchConnectivity::new(online);
    let runtime = SyncRuntime::with_pool(
        config,
        pool,
        Arc::new(remote.clone()),
        Arc::new(remote.clone()),
        connectivity.clone(),
    );

    OfflineTestContext {
        runtime,
        remote,
        connectivity,
    }
}

pub fn client_id(value: &str) -> ClientId {
    ClientId::parse(value).expect("client id")
}

pub fn server_id(value: &str) -> ServerId {
    ServerId::new(value.into()).expect("server id")
}

pub fn sample_draft(id: &str) -> DeliveryRecordDraft {
    let payload = RecordPayload::new(json!({
        "customer": format!("Customer {id}"),
        "items": [{"sku": "A-1", "qty": 2}],
    }))
    .expect("payload");
    DeliveryRecordDraft::new(payload).with_client_id(client_id(id))
}

pub fn sample_signature() -> SignatureImage {
    SignatureImage::from_data_url(SAMPLE_SIGNATURE).expect("signature image")
}

pub async fn enqueue(ctx: &OfflineTestContext, id: &str) -> DeliveryRecord {
    ctx.runtime.queue.enqueue_record(sample_draft(id)).await
}

pub async fn seed_remote_note(ctx: &OfflineTestContext, id: &str, client: Option<&str>) {
    let mut fields = json!({"customer": "seeded", "signatureStatus": "pending"})
        .as_object()
        .cloned()
        .expect("object");
    if let Some(client) = client {
        fields.insert("clientId".into(), json!(client));
    }
    ctx.remote
        .insert_document(NOTES, &server_id(id), fields)
        .await;
}

pub async fn pending_client_ids(ctx: &OfflineTestContext) -> Vec<String> {
    ctx.runtime
        .queue
        .list_pending()
        .await
        .expect("list pending")
        .into_iter()
        .map(|record| record.client_id.as_str().to_string())
        .collect()
}

pub fn drain_events(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[allow(dead_code)]
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<SyncEvent>, mut predicate: F) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}
