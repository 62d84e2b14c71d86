use super::mappers::{
    cached_documents_from_row, domain_record_from_row, domain_signature_from_row,
    counter_from_column, record_json_from_domain, DecodedRecord, CURRENT_RECORD_SCHEMA_VERSION,
};
use super::rows::{CachedDocumentsRow, DeliveryNoteRow, SignatureQueueRow};
use crate::application::ports::offline_store::{OfflinePersistence, SignatureFailureCounts};
use crate::domain::entities::offline::{DeliveryRecord, RemoteDocument, SignatureQueueEntry};
use crate::domain::value_objects::offline::{
    ClientId, ServerId, SignatureEntryId, SignatureTarget,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

pub struct SqliteOfflinePersistence {
    pool: Pool<Sqlite>,
}

impl SqliteOfflinePersistence {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn decode_signatures(rows: Vec<SignatureQueueRow>) -> Vec<SignatureQueueEntry> {
        rows.into_iter()
            .filter_map(|row| {
                let entry_id = row.entry_id.clone();
                match domain_signature_from_row(row) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        tracing::error!(
                            target: "offline::queue",
                            entry_id = %entry_id,
                            error = %err,
                            "skipping unreadable signature queue row"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl OfflinePersistence for SqliteOfflinePersistence {
    async fn insert_record(&self, record: &DeliveryRecord) -> Result<(), AppError> {
        let record_json = record_json_from_domain(record)?;

        sqlx::query(
            r#"
            INSERT INTO offline_delivery_notes (client_id, schema_version, record_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(record.client_id.as_str())
        .bind(CURRENT_RECORD_SCHEMA_VERSION)
        .bind(&record_json)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_pending_records(&self) -> Result<Vec<DeliveryRecord>, AppError> {
        let rows = sqlx::query_as::<_, DeliveryNoteRow>(
            r#"
            SELECT seq, client_id, schema_version, record_json, created_at
            FROM offline_delivery_notes
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let client_id = row.client_id.clone();
            match domain_record_from_row(row) {
                Ok(DecodedRecord::Current(record)) => records.push(record),
                Ok(DecodedRecord::FutureVersion { client_id, version }) => {
                    tracing::warn!(
                        target: "offline::queue",
                        client_id = %client_id,
                        schema_version = version,
                        "leaving delivery note written by a newer format untouched"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        target: "offline::queue",
                        client_id = %client_id,
                        error = %err,
                        "skipping unreadable delivery note row"
                    );
                }
            }
        }

        Ok(records)
    }

    async fn pending_record_count(&self) -> Result<usize, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offline_delivery_notes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn remove_record(&self, client_id: &ClientId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM offline_delivery_notes WHERE client_id = ?1")
            .bind(client_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_uploaded(
        &self,
        client_id: &ClientId,
        server_id: &ServerId,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO uploaded_local_ids (client_id, server_id, uploaded_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(client_id.as_str())
        .bind(server_id.as_str())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn uploaded_server_id(
        &self,
        client_id: &ClientId,
    ) -> Result<Option<ServerId>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT server_id FROM uploaded_local_ids WHERE client_id = ?1")
                .bind(client_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(server_id,)| ServerId::new(server_id).map_err(AppError::Validation))
            .transpose()
    }

    async fn insert_signature(&self, entry: &SignatureQueueEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO offline_signatures_queue (
                entry_id, target_kind, target_id, mime_type, image_data, attempts,
                parent_missing_attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(entry.entry_id.as_str())
        .bind(entry.target.kind())
        .bind(entry.target.id_str())
        .bind(entry.image.mime_type())
        .bind(entry.image.bytes())
        .bind(i64::from(entry.attempts))
        .bind(i64::from(entry.parent_missing_attempts))
        .bind(entry.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_signatures(&self) -> Result<Vec<SignatureQueueEntry>, AppError> {
        let rows = sqlx::query_as::<_, SignatureQueueRow>(
            "SELECT * FROM offline_signatures_queue ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(Self::decode_signatures(rows))
    }

    async fn signatures_for_target(
        &self,
        target: &SignatureTarget,
    ) -> Result<Vec<SignatureQueueEntry>, AppError> {
        let rows = sqlx::query_as::<_, SignatureQueueRow>(
            r#"
            SELECT * FROM offline_signatures_queue
            WHERE target_kind = ?1 AND target_id = ?2
            ORDER BY seq ASC
            "#,
        )
        .bind(target.kind())
        .bind(target.id_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(Self::decode_signatures(rows))
    }

    async fn remove_signature(&self, entry_id: &SignatureEntryId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM offline_signatures_queue WHERE entry_id = ?1")
            .bind(entry_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retarget_signature(
        &self,
        entry_id: &SignatureEntryId,
        target: &SignatureTarget,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE offline_signatures_queue
            SET target_kind = ?1, target_id = ?2
            WHERE entry_id = ?3
            "#,
        )
        .bind(target.kind())
        .bind(target.id_str())
        .bind(entry_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_signature_failure(
        &self,
        entry_id: &SignatureEntryId,
        parent_missing: bool,
    ) -> Result<SignatureFailureCounts, AppError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE offline_signatures_queue
            SET attempts = attempts + 1,
                parent_missing_attempts = parent_missing_attempts + ?2
            WHERE entry_id = ?1
            RETURNING attempts, parent_missing_attempts
            "#,
        )
        .bind(entry_id.as_str())
        .bind(i64::from(parent_missing))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((attempts, parent_missing)) => Ok(SignatureFailureCounts {
                attempts: counter_from_column(attempts),
                parent_missing: counter_from_column(parent_missing),
            }),
            None => Err(AppError::NotFound(format!(
                "signature queue entry {entry_id}"
            ))),
        }
    }

    async fn pending_signature_count(&self) -> Result<usize, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offline_signatures_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn store_cached_documents(
        &self,
        cache_key: &str,
        documents: &[RemoteDocument],
        cached_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let documents_json = serde_json::to_string(documents)
            .map_err(|err| AppError::Serialization(err.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO cached_pending_sign_docs (cache_key, documents_json, cached_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(cache_key) DO UPDATE SET
                documents_json = excluded.documents_json,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(cache_key)
        .bind(&documents_json)
        .bind(cached_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_cached_documents(
        &self,
        cache_key: &str,
    ) -> Result<Option<(Vec<RemoteDocument>, DateTime<Utc>)>, AppError> {
        let row = sqlx::query_as::<_, CachedDocumentsRow>(
            "SELECT * FROM cached_pending_sign_docs WHERE cache_key = ?1",
        )
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(cached_documents_from_row).transpose()
    }
}
