use crate::domain::entities::offline::{DeliveryRecord, RemoteDocument, SignatureQueueEntry};
use crate::domain::value_objects::offline::{
    ClientId, ServerId, SignatureEntryId, SignatureTarget,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureFailureCounts {
    pub attempts: u32,
    pub parent_missing: u32,
}

/// 端末内の永続キュー（納品書・署名・アップロード済み ID・署名待ちキャッシュ）。
#[async_trait]
pub trait OfflinePersistence: Send + Sync {
    async fn insert_record(&self, record: &DeliveryRecord) -> Result<(), AppError>;
    /// 挿入順で返す
    async fn list_pending_records(&self) -> Result<Vec<DeliveryRecord>, AppError>;
    async fn pending_record_count(&self) -> Result<usize, AppError>;
    /// 削除した場合は true。存在しなければ false を返し、エラーにはしない。
    async fn remove_record(&self, client_id: &ClientId) -> Result<bool, AppError>;

    async fn mark_uploaded(
        &self,
        client_id: &ClientId,
        server_id: &ServerId,
    ) -> Result<(), AppError>;
    async fn uploaded_server_id(&self, client_id: &ClientId)
        -> Result<Option<ServerId>, AppError>;

    async fn insert_signature(&self, entry: &SignatureQueueEntry) -> Result<(), AppError>;
    async fn list_signatures(&self) -> Result<Vec<SignatureQueueEntry>, AppError>;
    async fn signatures_for_target(
        &self,
        target: &SignatureTarget,
    ) -> Result<Vec<SignatureQueueEntry>, AppError>;
    async fn remove_signature(&self, entry_id: &SignatureEntryId) -> Result<bool, AppError>;
    async fn retarget_signature(
        &self,
        entry_id: &SignatureEntryId,
        target: &SignatureTarget,
    ) -> Result<(), AppError>;
    /// 失敗回数を 1 増やし、更新後の値を返す。
    /// `parent_missing` が true のときは親欠落の回数も増やす。
    async fn record_signature_failure(
        &self,
        entry_id: &SignatureEntryId,
        parent_missing: bool,
    ) -> Result<SignatureFailureCounts, AppError>;
    async fn pending_signature_count(&self) -> Result<usize, AppError>;

    async fn store_cached_documents(
        &self,
        cache_key: &str,
        documents: &[RemoteDocument],
        cached_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    async fn load_cached_documents(
        &self,
        cache_key: &str,
    ) -> Result<Option<(Vec<RemoteDocument>, DateTime<Utc>)>, AppError>;
}
