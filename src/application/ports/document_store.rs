use crate::domain::entities::offline::RemoteDocument;
use crate::domain::value_objects::offline::ServerId;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

pub type DocumentFields = Map<String, Value>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error("document not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// ストア側で書き込み時刻に置き換えられるセンチネル値
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get(".sv"))
        .and_then(Value::as_str)
        == Some("timestamp")
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        collection: &str,
        fields: DocumentFields,
    ) -> Result<ServerId, StoreError>;

    async fn get_document(
        &self,
        collection: &str,
        id: &ServerId,
    ) -> Result<Option<RemoteDocument>, StoreError>;

    async fn query_documents(
        &self,
        collection: &str,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<RemoteDocument>, StoreError>;

    async fn update_document(
        &self,
        collection: &str,
        id: &ServerId,
        fields: DocumentFields,
    ) -> Result<(), StoreError>;
}

/// アップロード済み Blob のストレージ上のパス
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_blob(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<BlobRef, StoreError>;

    async fn blob_url(&self, blob: &BlobRef) -> Result<String, StoreError>;

    async fn delete_blob(&self, blob: &BlobRef) -> Result<(), StoreError>;
}
