use crate::domain::value_objects::offline::{ClientId, RecordPayload, ServerId, SignatureStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UI 層から受け取る作成前の納品書。
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecordDraft {
    pub client_id: Option<ClientId>,
    pub payload: RecordPayload,
    pub signature_status: SignatureStatus,
}

impl DeliveryRecordDraft {
    pub fn new(payload: RecordPayload) -> Self {
        Self {
            client_id: None,
            payload,
            signature_status: SignatureStatus::Pending,
        }
    }

    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub client_id: ClientId,
    #[serde(default)]
    pub server_id: Option<ServerId>,
    pub payload: RecordPayload,
    #[serde(default)]
    pub signature_status: SignatureStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub locally_originated: bool,
}

impl DeliveryRecord {
    pub fn from_draft(draft: DeliveryRecordDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            client_id: draft.client_id.unwrap_or_else(ClientId::generate),
            server_id: None,
            payload: draft.payload,
            signature_status: draft.signature_status,
            created_at,
            locally_originated: true,
        }
    }

    pub fn uploaded(&self) -> bool {
        self.server_id.is_some()
    }
}

fn default_true() -> bool {
    true
}
