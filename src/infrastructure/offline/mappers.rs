use super::rows::{CachedDocumentsRow, DeliveryNoteRow, SignatureQueueRow};
use crate::domain::entities::offline::{DeliveryRecord, RemoteDocument, SignatureQueueEntry};
use crate::domain::value_objects::offline::{SignatureEntryId, SignatureImage, SignatureTarget};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};

/// 現在書き込む納品書レコードのフォーマット
pub const CURRENT_RECORD_SCHEMA_VERSION: i64 = 1;

pub enum DecodedRecord {
    Current(DeliveryRecord),
    /// 新しいバージョンのアプリが書いた行。触らずに残す。
    FutureVersion { client_id: String, version: i64 },
}

pub fn record_json_from_domain(record: &DeliveryRecord) -> Result<String, AppError> {
    serde_json::to_string(record).map_err(|err| AppError::Serialization(err.to_string()))
}

pub fn domain_record_from_row(row: DeliveryNoteRow) -> Result<DecodedRecord, AppError> {
    if row.schema_version > CURRENT_RECORD_SCHEMA_VERSION {
        return Ok(DecodedRecord::FutureVersion {
            client_id: row.client_id,
            version: row.schema_version,
        });
    }

    let record: DeliveryRecord = serde_json::from_str(&row.record_json).map_err(|err| {
        AppError::Deserialization(format!(
            "delivery note {} is unreadable: {err}",
            row.client_id
        ))
    })?;

    if record.client_id.as_str() != row.client_id {
        return Err(AppError::Validation(format!(
            "delivery note row {} carries mismatched client id {}",
            row.client_id, record.client_id
        )));
    }

    Ok(DecodedRecord::Current(record))
}

pub fn domain_signature_from_row(row: SignatureQueueRow) -> Result<SignatureQueueEntry, AppError> {
    let entry_id = SignatureEntryId::new(row.entry_id).map_err(AppError::Validation)?;
    let target = SignatureTarget::from_parts(&row.target_kind, row.target_id)
        .map_err(AppError::Validation)?;
    let image =
        SignatureImage::new(row.mime_type, row.image_data).map_err(AppError::Validation)?;

    Ok(SignatureQueueEntry {
        entry_id,
        target,
        image,
        created_at: datetime_from_millis(row.created_at),
        attempts: counter_from_column(row.attempts),
        parent_missing_attempts: counter_from_column(row.parent_missing_attempts),
    })
}

pub fn cached_documents_from_row(
    row: CachedDocumentsRow,
) -> Result<(Vec<RemoteDocument>, DateTime<Utc>), AppError> {
    let documents: Vec<RemoteDocument> = serde_json::from_str(&row.documents_json)
        .map_err(|err| AppError::Deserialization(err.to_string()))?;
    Ok((documents, datetime_from_millis(row.cached_at)))
}

pub fn counter_from_column(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

pub fn datetime_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}
