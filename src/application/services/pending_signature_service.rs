use super::signature_service::SIGNATURE_STATUS_FIELD;
use crate::application::ports::document_store::DocumentStore;
use crate::application::ports::offline_store::OfflinePersistence;
use crate::domain::entities::offline::{PendingSignSnapshot, PendingSignSource};
use crate::domain::value_objects::offline::SignatureStatus;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

const PENDING_SIGN_CACHE_KEY: &str = "pending_sign_documents";

/// 署名待ち納品書の一覧を返す。ストアに届かない間は最後の取得結果で代替する。
pub struct PendingSignatureService {
    persistence: Arc<dyn OfflinePersistence>,
    documents: Arc<dyn DocumentStore>,
    collection: String,
}

impl PendingSignatureService {
    pub fn new(
        persistence: Arc<dyn OfflinePersistence>,
        documents: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            documents,
            collection: collection.into(),
        }
    }

    pub async fn pending_sign_documents(&self) -> PendingSignSnapshot {
        let pending = Value::String(SignatureStatus::Pending.as_str().to_string());
        match self
            .documents
            .query_documents(&self.collection, SIGNATURE_STATUS_FIELD, &pending)
            .await
        {
            Ok(documents) => {
                let fetched_at = Utc::now();
                if let Err(err) = self
                    .persistence
                    .store_cached_documents(PENDING_SIGN_CACHE_KEY, &documents, fetched_at)
                    .await
                {
                    tracing::warn!(
                        target: "offline::signature",
                        error = %err,
                        "failed to cache pending-sign documents"
                    );
                }
                PendingSignSnapshot {
                    source: PendingSignSource::Fresh,
                    documents,
                    fetched_at: Some(fetched_at),
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "offline::signature",
                    error = %err,
                    "pending-sign query failed, serving cached list"
                );
                self.cached_snapshot().await
            }
        }
    }

    async fn cached_snapshot(&self) -> PendingSignSnapshot {
        let cached = self
            .persistence
            .load_cached_documents(PENDING_SIGN_CACHE_KEY)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(
                    target: "offline::signature",
                    error = %err,
                    "failed to read pending-sign cache"
                );
                None
            });

        match cached {
            Some((documents, cached_at)) => PendingSignSnapshot {
                source: PendingSignSource::Cached,
                documents,
                fetched_at: Some(cached_at),
            },
            None => PendingSignSnapshot {
                source: PendingSignSource::Cached,
                documents: Vec::new(),
                fetched_at: None,
            },
        }
    }
}
