use super::offline_queue_service::OfflineQueueService;
use super::signature_service::{
    ReplayReport, SignatureAttachmentService, SIGNATURE_STATUS_FIELD,
};
use crate::application::ports::document_store::{
    server_timestamp, DocumentFields, DocumentStore, StoreError,
};
use crate::domain::entities::offline::DeliveryRecord;
use crate::domain::value_objects::offline::{ClientId, ServerId};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub const CLIENT_ID_FIELD: &str = "clientId";
pub const LOCAL_CREATED_AT_FIELD: &str = "localCreatedAt";
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePath {
    /// 端末側でアップロード済みとして記録されていた
    AlreadyMarked,
    /// リモートに同じ clientId のドキュメントが既にあった
    FoundRemote,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub client_id: ClientId,
    pub server_id: ServerId,
    pub path: ReconcilePath,
    pub signatures: ReplayReport,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("failed to create delivery note {client_id}: {source}")]
    CreateFailed {
        client_id: ClientId,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    pub fn client_id(&self) -> &ClientId {
        match self {
            ReconcileError::CreateFailed { client_id, .. } => client_id,
        }
    }
}

/// 端末採番の clientId とサーバー採番の ID を突き合わせ、二重作成を防ぐ。
pub struct RecordReconciler {
    queue: Arc<OfflineQueueService>,
    documents: Arc<dyn DocumentStore>,
    signatures: Arc<SignatureAttachmentService>,
    collection: String,
}

impl RecordReconciler {
    pub fn new(
        queue: Arc<OfflineQueueService>,
        documents: Arc<dyn DocumentStore>,
        signatures: Arc<SignatureAttachmentService>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            documents,
            signatures,
            collection: collection.into(),
        }
    }

    pub async fn reconcile(
        &self,
        record: &DeliveryRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let client_id = &record.client_id;

        if let Some(server_id) = self.already_marked(client_id).await {
            tracing::info!(
                target: "offline::reconcile",
                client_id = %client_id,
                server_id = %server_id,
                "delivery note already uploaded, cleaning up queue"
            );
            return Ok(self
                .finish(client_id, server_id, ReconcilePath::AlreadyMarked)
                .await);
        }

        if let Some(server_id) = self.find_remote(client_id).await {
            tracing::info!(
                target: "offline::reconcile",
                client_id = %client_id,
                server_id = %server_id,
                "delivery note found remotely, skipping create"
            );
            return Ok(self
                .finish(client_id, server_id, ReconcilePath::FoundRemote)
                .await);
        }

        let server_id = self
            .documents
            .create_document(&self.collection, self.create_fields(record))
            .await
            .map_err(|source| ReconcileError::CreateFailed {
                client_id: client_id.clone(),
                source,
            })?;

        tracing::info!(
            target: "offline::reconcile",
            client_id = %client_id,
            server_id = %server_id,
            "delivery note created"
        );
        Ok(self
            .finish(client_id, server_id, ReconcilePath::Created)
            .await)
    }

    async fn already_marked(&self, client_id: &ClientId) -> Option<ServerId> {
        match self.queue.is_uploaded(client_id).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(
                    target: "offline::reconcile",
                    client_id = %client_id,
                    error = %err,
                    "failed to read uploaded id set, falling back to remote lookup"
                );
                None
            }
        }
    }

    async fn find_remote(&self, client_id: &ClientId) -> Option<ServerId> {
        let equals = Value::String(client_id.as_str().to_string());
        match self
            .documents
            .query_documents(&self.collection, CLIENT_ID_FIELD, &equals)
            .await
        {
            Ok(documents) => documents.into_iter().next().map(|doc| doc.id),
            Err(err) => {
                // 見つからなかったものとして作成に進む
                tracing::warn!(
                    target: "offline::reconcile",
                    client_id = %client_id,
                    error = %err,
                    "existence check failed, proceeding with create"
                );
                None
            }
        }
    }

    fn create_fields(&self, record: &DeliveryRecord) -> DocumentFields {
        let mut fields = record.payload.as_map().clone();
        fields.insert(
            CLIENT_ID_FIELD.to_string(),
            Value::String(record.client_id.as_str().to_string()),
        );
        fields.insert(
            LOCAL_CREATED_AT_FIELD.to_string(),
            Value::String(record.created_at.to_rfc3339()),
        );
        fields.insert(
            SIGNATURE_STATUS_FIELD.to_string(),
            Value::String(record.signature_status.as_str().to_string()),
        );
        fields.insert(CREATED_AT_FIELD.to_string(), server_timestamp());
        fields
    }

    /// 先にアップロード済みとして記録してからキューから外す。
    /// 間で落ちても次回は AlreadyMarked 経由で片付く。
    async fn finish(
        &self,
        client_id: &ClientId,
        server_id: ServerId,
        path: ReconcilePath,
    ) -> ReconcileOutcome {
        if path != ReconcilePath::AlreadyMarked {
            if let Err(err) = self.queue.mark_uploaded(client_id, &server_id).await {
                tracing::error!(
                    target: "offline::reconcile",
                    client_id = %client_id,
                    server_id = %server_id,
                    error = %err,
                    "failed to record uploaded id"
                );
            }
        }

        if let Err(err) = self.queue.remove_by_client_id(client_id).await {
            tracing::error!(
                target: "offline::reconcile",
                client_id = %client_id,
                error = %err,
                "failed to remove uploaded delivery note from queue"
            );
        }

        let signatures = self
            .signatures
            .replay_for_client_id(client_id, &server_id)
            .await;

        ReconcileOutcome {
            client_id: client_id.clone(),
            server_id,
            path,
            signatures,
        }
    }
}
