use crate::application::ports::document_store::{
    is_server_timestamp, BlobRef, BlobStore, DocumentFields, DocumentStore, StoreError,
};
use crate::domain::entities::offline::RemoteDocument;
use crate::domain::value_objects::offline::ServerId;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Get,
    Query,
    Update,
    UploadBlob,
    BlobUrl,
    DeleteBlob,
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, DocumentFields>>,
    blobs: BTreeMap<String, StoredBlob>,
    fail_next: HashMap<StoreOp, u32>,
    lost_create_acks: u32,
    calls: HashMap<StoreOp, u32>,
}

/// メモリ上のドキュメントストア兼 Blob ストア。
/// 到達不能状態や操作単位の失敗を注入でき、開発用ハーネスとテストで使う。
#[derive(Clone)]
pub struct InMemoryRemoteStore {
    available: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
    latency_ms: Arc<AtomicU64>,
    inner: Arc<RwLock<Inner>>,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(true)),
            next_id: Arc::new(AtomicU64::new(1)),
            latency_ms: Arc::new(AtomicU64::new(0)),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub fn unreachable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// 各操作の前に待機を挟む。同期パスの重なりを再現するのに使う。
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// 次の `times` 回の `op` を `Unavailable` で失敗させる
    pub async fn fail_next(&self, op: StoreOp, times: u32) {
        self.inner.write().await.fail_next.insert(op, times);
    }

    /// 作成はコミットされるが応答が失われる状況を再現する
    pub async fn lose_next_create_acks(&self, times: u32) {
        self.inner.write().await.lost_create_acks = times;
    }

    pub async fn calls(&self, op: StoreOp) -> u32 {
        self.inner
            .read()
            .await
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    pub async fn documents(&self, collection: &str) -> Vec<RemoteDocument> {
        let inner = self.inner.read().await;
        inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter_map(|(id, fields)| to_document(id, fields))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn document(&self, collection: &str, id: &str) -> Option<RemoteDocument> {
        let inner = self.inner.read().await;
        inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .and_then(|fields| to_document(id, fields))
    }

    pub async fn insert_document(&self, collection: &str, id: &ServerId, fields: DocumentFields) {
        let mut inner = self.inner.write().await;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.as_str().to_string(), resolve_sentinels(fields));
    }

    pub async fn remove_document(&self, collection: &str, id: &ServerId) -> bool {
        let mut inner = self.inner.write().await;
        inner
            .collections
            .get_mut(collection)
            .map(|docs| docs.remove(id.as_str()).is_some())
            .unwrap_or(false)
    }

    pub async fn blob_paths(&self) -> Vec<String> {
        self.inner.read().await.blobs.keys().cloned().collect()
    }

    pub async fn blob(&self, path: &str) -> Option<StoredBlob> {
        self.inner.read().await.blobs.get(path).cloned()
    }

    async fn begin(&self, op: StoreOp) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let mut inner = self.inner.write().await;
        *inner.calls.entry(op).or_insert(0) += 1;

        if !self.is_available() {
            return Err(StoreError::Unavailable("remote store is unreachable".into()));
        }

        if let Some(remaining) = inner.fail_next.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "injected failure for {op:?}"
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryRemoteStore {
    async fn create_document(
        &self,
        collection: &str,
        fields: DocumentFields,
    ) -> Result<ServerId, StoreError> {
        self.begin(StoreOp::Create).await?;

        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut inner = self.inner.write().await;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), resolve_sentinels(fields));

        if inner.lost_create_acks > 0 {
            inner.lost_create_acks -= 1;
            return Err(StoreError::Unavailable(
                "connection dropped before create was acknowledged".into(),
            ));
        }

        ServerId::new(id).map_err(StoreError::Rejected)
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &ServerId,
    ) -> Result<Option<RemoteDocument>, StoreError> {
        self.begin(StoreOp::Get).await?;
        Ok(self.document(collection, id.as_str()).await)
    }

    async fn query_documents(
        &self,
        collection: &str,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<RemoteDocument>, StoreError> {
        self.begin(StoreOp::Query).await?;
        Ok(self
            .documents(collection)
            .await
            .into_iter()
            .filter(|doc| doc.fields.get(field) == Some(equals))
            .collect())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &ServerId,
        fields: DocumentFields,
    ) -> Result<(), StoreError> {
        self.begin(StoreOp::Update).await?;

        let mut inner = self.inner.write().await;
        let existing = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id.as_str()))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;

        for (key, value) in resolve_sentinels(fields) {
            existing.insert(key, value);
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryRemoteStore {
    async fn upload_blob(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<BlobRef, StoreError> {
        self.begin(StoreOp::UploadBlob).await?;

        let mut inner = self.inner.write().await;
        inner.blobs.insert(
            path.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(BlobRef::new(path))
    }

    async fn blob_url(&self, blob: &BlobRef) -> Result<String, StoreError> {
        self.begin(StoreOp::BlobUrl).await?;

        let inner = self.inner.read().await;
        if inner.blobs.contains_key(blob.path()) {
            Ok(format!("memory://{}", blob.path()))
        } else {
            Err(StoreError::NotFound(blob.path().to_string()))
        }
    }

    async fn delete_blob(&self, blob: &BlobRef) -> Result<(), StoreError> {
        self.begin(StoreOp::DeleteBlob).await?;

        let mut inner = self.inner.write().await;
        inner
            .blobs
            .remove(blob.path())
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(blob.path().to_string()))
    }
}

fn to_document(id: &str, fields: &DocumentFields) -> Option<RemoteDocument> {
    ServerId::new(id.to_string())
        .ok()
        .map(|server_id| RemoteDocument::new(server_id, fields.clone()))
}

fn resolve_sentinels(fields: DocumentFields) -> DocumentFields {
    let now = Utc::now().to_rfc3339();
    fields
        .into_iter()
        .map(|(key, value)| {
            if is_server_timestamp(&value) {
                (key, Value::String(now.clone()))
            } else {
                (key, value)
            }
        })
        .collect()
}
