use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryNoteRow {
    pub seq: i64,
    pub client_id: String,
    pub schema_version: i64,
    pub record_json: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SignatureQueueRow {
    pub seq: i64,
    pub entry_id: String,
    pub target_kind: String,
    pub target_id: String,
    pub mime_type: String,
    pub image_data: Vec<u8>,
    pub attempts: i64,
    pub parent_missing_attempts: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CachedDocumentsRow {
    pub cache_key: String,
    pub documents_json: String,
    pub cached_at: i64,
}
