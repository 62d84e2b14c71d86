use super::sync_events::SyncEventBus;
use crate::application::ports::offline_store::OfflinePersistence;
use crate::domain::entities::offline::{DeliveryRecord, DeliveryRecordDraft, SyncEvent};
use crate::domain::value_objects::offline::{ClientId, ServerId};
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;

/// 未アップロードの納品書を保持する端末内キュー。
pub struct OfflineQueueService {
    persistence: Arc<dyn OfflinePersistence>,
    events: SyncEventBus,
}

impl OfflineQueueService {
    pub fn new(persistence: Arc<dyn OfflinePersistence>, events: SyncEventBus) -> Self {
        Self {
            persistence,
            events,
        }
    }

    /// 納品書をキューに積む。保存に失敗してもユーザー操作は止めない。
    pub async fn enqueue_record(&self, draft: DeliveryRecordDraft) -> DeliveryRecord {
        let record = DeliveryRecord::from_draft(draft, Utc::now());

        match self.persistence.insert_record(&record).await {
            Ok(()) => {
                tracing::info!(
                    target: "offline::queue",
                    client_id = %record.client_id,
                    "delivery note queued for upload"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: "offline::queue",
                    client_id = %record.client_id,
                    error = %err,
                    "failed to persist delivery note locally"
                );
            }
        }

        self.notify_queue_count().await;
        record
    }

    pub async fn list_pending(&self) -> Result<Vec<DeliveryRecord>, AppError> {
        self.persistence.list_pending_records().await
    }

    pub async fn pending_count(&self) -> Result<usize, AppError> {
        self.persistence.pending_record_count().await
    }

    /// 存在しない ID は何もせず `Ok(false)` を返す
    pub async fn remove_by_client_id(&self, client_id: &ClientId) -> Result<bool, AppError> {
        let removed = self.persistence.remove_record(client_id).await?;
        if removed {
            tracing::debug!(
                target: "offline::queue",
                client_id = %client_id,
                "delivery note removed from queue"
            );
            self.notify_queue_count().await;
        }
        Ok(removed)
    }

    pub async fn mark_uploaded(
        &self,
        client_id: &ClientId,
        server_id: &ServerId,
    ) -> Result<(), AppError> {
        self.persistence.mark_uploaded(client_id, server_id).await
    }

    /// アップロード済みなら割り当てられた server ID を返す
    pub async fn is_uploaded(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<ServerId>, AppError> {
        self.persistence.uploaded_server_id(client_id).await
    }

    async fn notify_queue_count(&self) {
        match self.persistence.pending_record_count().await {
            Ok(count) => self.events.emit(SyncEvent::QueueCountChanged { count }),
            Err(err) => tracing::warn!(
                target: "offline::queue",
                error = %err,
                "failed to count pending delivery notes"
            ),
        }
    }
}
