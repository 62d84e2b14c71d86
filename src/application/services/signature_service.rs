use crate::application::ports::document_store::{
    server_timestamp, BlobRef, BlobStore, DocumentFields, DocumentStore, StoreError,
};
use crate::application::ports::offline_store::{OfflinePersistence, SignatureFailureCounts};
use crate::domain::entities::offline::SignatureQueueEntry;
use crate::domain::value_objects::offline::{
    ClientId, ServerId, SignatureImage, SignatureStatus, SignatureTarget,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub const SIGNATURE_STATUS_FIELD: &str = "signatureStatus";
pub const SIGNATURE_URL_FIELD: &str = "signatureUrl";
pub const SIGNATURE_PATH_FIELD: &str = "signaturePath";
pub const SIGNED_AT_FIELD: &str = "signedAt";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttachError {
    #[error("parent delivery note lookup failed: {0}")]
    ParentLookupFailed(StoreError),

    #[error("signature blob upload failed: {0}")]
    BlobUploadFailed(StoreError),

    #[error("signature record update failed: {0}")]
    RecordUpdateFailed(StoreError),

    #[error("parent delivery note {0} not found")]
    ParentNotFound(ServerId),
}

impl AttachError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, AttachError::ParentNotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedSignature {
    pub server_id: ServerId,
    pub blob_path: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub attached: usize,
    pub failed: usize,
    pub dropped: usize,
}

impl ReplayReport {
    fn merge(&mut self, other: ReplayReport) {
        self.attached += other.attached;
        self.failed += other.failed;
        self.dropped += other.dropped;
    }
}

pub struct SignatureAttachmentSettings {
    pub notes_collection: String,
    pub path_prefix: String,
    pub max_attempts: u32,
}

/// 親レコードの ID が確定するまで署名画像を保留し、確定後に添付する。
pub struct SignatureAttachmentService {
    persistence: Arc<dyn OfflinePersistence>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    settings: SignatureAttachmentSettings,
}

impl SignatureAttachmentService {
    pub fn new(
        persistence: Arc<dyn OfflinePersistence>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        settings: SignatureAttachmentSettings,
    ) -> Self {
        Self {
            persistence,
            documents,
            blobs,
            settings,
        }
    }

    pub async fn enqueue_signature(
        &self,
        target: SignatureTarget,
        image: SignatureImage,
    ) -> SignatureQueueEntry {
        let entry = SignatureQueueEntry::new(target, image, Utc::now());

        if let Err(err) = self.persistence.insert_signature(&entry).await {
            tracing::error!(
                target: "offline::signature",
                entry_id = %entry.entry_id,
                target_ref = %entry.target,
                error = %err,
                "failed to persist signature locally"
            );
        } else {
            tracing::info!(
                target: "offline::signature",
                entry_id = %entry.entry_id,
                target_ref = %entry.target,
                "signature queued for attachment"
            );
        }

        entry
    }

    pub async fn pending_count(&self) -> usize {
        self.persistence
            .pending_signature_count()
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(
                    target: "offline::signature",
                    error = %err,
                    "failed to count queued signatures"
                );
                0
            })
    }

    /// 親レコードに server ID が付いた直後に呼ばれる。
    /// 添付に失敗したエントリは server 宛てに付け替え、以降のパスで再試行する。
    pub async fn replay_for_client_id(
        &self,
        client_id: &ClientId,
        server_id: &ServerId,
    ) -> ReplayReport {
        let target = SignatureTarget::Client(client_id.clone());
        let entries = match self.persistence.signatures_for_target(&target).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    target: "offline::signature",
                    client_id = %client_id,
                    error = %err,
                    "failed to load signatures queued for delivery note"
                );
                return ReplayReport::default();
            }
        };

        let mut report = ReplayReport::default();
        let server_target = SignatureTarget::Server(server_id.clone());
        for entry in entries {
            let attached = self.process_entry(&entry, server_id, &mut report).await;
            if !attached {
                if let Err(err) = self
                    .persistence
                    .retarget_signature(&entry.entry_id, &server_target)
                    .await
                {
                    tracing::warn!(
                        target: "offline::signature",
                        entry_id = %entry.entry_id,
                        error = %err,
                        "failed to retarget signature to server id"
                    );
                }
            }
        }
        report
    }

    /// server ID を持つエントリをすべて添付する。
    /// アップロード済みと分かっている client 宛てエントリも先に付け替える。
    pub async fn replay_server_targeted(&self) -> ReplayReport {
        let entries = match self.persistence.list_signatures().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    target: "offline::signature",
                    error = %err,
                    "failed to load signature queue"
                );
                return ReplayReport::default();
            }
        };

        let mut report = ReplayReport::default();
        for entry in entries {
            let server_id = match &entry.target {
                SignatureTarget::Server(server_id) => server_id.clone(),
                SignatureTarget::Client(client_id) => {
                    match self.persistence.uploaded_server_id(client_id).await {
                        Ok(Some(server_id)) => {
                            report.merge(self.replay_for_client_id(client_id, &server_id).await);
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(
                            target: "offline::signature",
                            client_id = %client_id,
                            error = %err,
                            "failed to resolve uploaded id for queued signature"
                        ),
                    }
                    continue;
                }
            };

            self.process_entry(&entry, &server_id, &mut report).await;
        }
        report
    }

    /// 1 件添付し、結果に応じてキューを更新する。添付できたら true。
    async fn process_entry(
        &self,
        entry: &SignatureQueueEntry,
        server_id: &ServerId,
        report: &mut ReplayReport,
    ) -> bool {
        match self.attach(entry, server_id).await {
            Ok(attached) => {
                tracing::info!(
                    target: "offline::signature",
                    entry_id = %entry.entry_id,
                    server_id = %attached.server_id,
                    blob_path = %attached.blob_path,
                    "signature attached"
                );
                if let Err(err) = self.persistence.remove_signature(&entry.entry_id).await {
                    // 残っても次回は同じフィールドを上書きするだけ
                    tracing::warn!(
                        target: "offline::signature",
                        entry_id = %entry.entry_id,
                        error = %err,
                        "failed to remove attached signature from queue"
                    );
                }
                report.attached += 1;
                true
            }
            Err(err) => {
                let parent_missing = err.is_permanent();
                let counts = self
                    .persistence
                    .record_signature_failure(&entry.entry_id, parent_missing)
                    .await
                    .unwrap_or(SignatureFailureCounts {
                        attempts: entry.attempts.saturating_add(1),
                        parent_missing: entry
                            .parent_missing_attempts
                            .saturating_add(u32::from(parent_missing)),
                    });

                // 一時的な失敗は破棄の判定に数えない
                if parent_missing && counts.parent_missing >= self.settings.max_attempts {
                    tracing::warn!(
                        target: "offline::signature",
                        entry_id = %entry.entry_id,
                        attempts = counts.attempts,
                        parent_missing = counts.parent_missing,
                        error = %err,
                        "dropping signature whose delivery note no longer exists"
                    );
                    if let Err(remove_err) =
                        self.persistence.remove_signature(&entry.entry_id).await
                    {
                        tracing::warn!(
                            target: "offline::signature",
                            entry_id = %entry.entry_id,
                            error = %remove_err,
                            "failed to drop orphaned signature"
                        );
                    }
                    report.dropped += 1;
                    // 破棄済みなので付け替え不要
                    return true;
                }

                tracing::warn!(
                    target: "offline::signature",
                    entry_id = %entry.entry_id,
                    attempts = counts.attempts,
                    error = %err,
                    "signature attachment failed, will retry on next sync"
                );
                report.failed += 1;
                false
            }
        }
    }

    pub async fn attach(
        &self,
        entry: &SignatureQueueEntry,
        server_id: &ServerId,
    ) -> Result<AttachedSignature, AttachError> {
        let collection = self.settings.notes_collection.as_str();

        let parent = self
            .documents
            .get_document(collection, server_id)
            .await
            .map_err(AttachError::ParentLookupFailed)?
            .ok_or_else(|| AttachError::ParentNotFound(server_id.clone()))?;
        let previous_path = parent.str_field(SIGNATURE_PATH_FIELD).map(str::to_string);

        let blob_path = self.blob_path(entry, server_id);
        let blob = self
            .blobs
            .upload_blob(&blob_path, entry.image.bytes(), entry.image.mime_type())
            .await
            .map_err(AttachError::BlobUploadFailed)?;
        let url = self
            .blobs
            .blob_url(&blob)
            .await
            .map_err(AttachError::BlobUploadFailed)?;

        if let Some(previous) = previous_path.filter(|path| path != &blob_path) {
            self.delete_previous_blob(server_id, BlobRef::new(previous))
                .await;
        }

        let mut fields = DocumentFields::new();
        fields.insert(
            SIGNATURE_STATUS_FIELD.to_string(),
            Value::String(SignatureStatus::Completed.as_str().to_string()),
        );
        fields.insert(SIGNATURE_URL_FIELD.to_string(), Value::String(url.clone()));
        fields.insert(
            SIGNATURE_PATH_FIELD.to_string(),
            Value::String(blob.path().to_string()),
        );
        fields.insert(SIGNED_AT_FIELD.to_string(), server_timestamp());

        self.documents
            .update_document(collection, server_id, fields)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => AttachError::ParentNotFound(server_id.clone()),
                other => AttachError::RecordUpdateFailed(other),
            })?;

        Ok(AttachedSignature {
            server_id: server_id.clone(),
            blob_path: blob.path().to_string(),
            url,
        })
    }

    async fn delete_previous_blob(&self, server_id: &ServerId, previous: BlobRef) {
        if let Err(err) = self.blobs.delete_blob(&previous).await {
            tracing::warn!(
                target: "offline::signature",
                server_id = %server_id,
                blob_path = %previous,
                error = %err,
                "failed to delete previous signature blob"
            );
        }
    }

    fn blob_path(&self, entry: &SignatureQueueEntry, server_id: &ServerId) -> String {
        format!(
            "{}/{}/{}_{}.{}",
            self.settings.path_prefix,
            server_id,
            Utc::now().timestamp_millis(),
            entry.entry_id,
            entry.image.file_extension()
        )
    }
}
