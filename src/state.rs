use crate::application::ports::{BlobStore, DocumentStore, OfflinePersistence};
use crate::application::services::{
    OfflineQueueService, PendingSignatureService, RecordReconciler, SignatureAttachmentService,
    SignatureAttachmentSettings, SyncEventBus, SyncService,
};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::network::WatchConnectivity;
use crate::infrastructure::offline::SqliteOfflinePersistence;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 同期コア全体のサービスグラフ。起動時に一度だけ組み立てる。
#[derive(Clone)]
pub struct SyncRuntime {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub events: SyncEventBus,
    pub connectivity: WatchConnectivity,
    pub queue: Arc<OfflineQueueService>,
    pub reconciler: Arc<RecordReconciler>,
    pub signatures: Arc<SignatureAttachmentService>,
    pub pending_signatures: Arc<PendingSignatureService>,
    pub sync: SyncService,
}

impl SyncRuntime {
    pub async fn new(
        config: AppConfig,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        connectivity: WatchConnectivity,
    ) -> anyhow::Result<Self> {
        config.validate().map_err(AppError::Configuration)?;

        ensure_data_dir(&config.database.url)?;
        let pool = ConnectionPool::from_config(&config.database).await?;
        pool.migrate().await?;

        Ok(Self::with_pool(config, pool, documents, blobs, connectivity))
    }

    pub fn with_pool(
        config: AppConfig,
        pool: ConnectionPool,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        connectivity: WatchConnectivity,
    ) -> Self {
        let persistence: Arc<dyn OfflinePersistence> =
            Arc::new(SqliteOfflinePersistence::new(pool.get_pool().clone()));
        let events = SyncEventBus::new(config.sync.event_buffer);
        let collection = config.remote.notes_collection.clone();

        let queue = Arc::new(OfflineQueueService::new(
            persistence.clone(),
            events.clone(),
        ));
        let signatures = Arc::new(SignatureAttachmentService::new(
            persistence.clone(),
            documents.clone(),
            blobs,
            SignatureAttachmentSettings {
                notes_collection: collection.clone(),
                path_prefix: config.remote.signature_path_prefix.clone(),
                max_attempts: config.sync.max_signature_attempts,
            },
        ));
        let reconciler = Arc::new(RecordReconciler::new(
            queue.clone(),
            documents.clone(),
            signatures.clone(),
            collection.clone(),
        ));
        let pending_signatures = Arc::new(PendingSignatureService::new(
            persistence,
            documents,
            collection,
        ));
        let sync = SyncService::new(
            queue.clone(),
            reconciler.clone(),
            signatures.clone(),
            Arc::new(connectivity.clone()),
            events.clone(),
        );

        tracing::info!(
            target: "offline::sync",
            collection = %config.remote.notes_collection,
            auto_sync = config.sync.auto_sync_on_reconnect,
            "sync runtime initialized"
        );

        Self {
            config,
            pool,
            events,
            connectivity,
            queue,
            reconciler,
            signatures,
            pending_signatures,
            sync,
        }
    }

    /// 設定で有効な場合のみ再接続時の自動同期を開始する
    pub fn start_auto_sync(&self) -> Option<JoinHandle<()>> {
        if !self.config.sync.auto_sync_on_reconnect {
            return None;
        }
        Some(self.sync.watch_connectivity(self.connectivity.subscribe()))
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
    }
}

/// ファイル DB の親ディレクトリがなければ作成する
fn ensure_data_dir(database_url: &str) -> std::io::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = rest.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
